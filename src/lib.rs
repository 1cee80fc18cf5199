pub mod agent;
pub mod cli;
pub mod config;
pub mod console;
pub mod flows;
pub mod llm;
pub mod models;
pub mod relay;

use agent::AIAgent;
use cli::{ Args, Command };
use flows::beats::{ self, GenerateBeatInput, SuggestBeatImprovementsInput };
use flows::code;
use flows::diagnosis::{ self, DiagnoseExamInput };
use llm::media::{ mime_for_extension, DataUri };
use log::info;
use std::error::Error;
use std::path::Path;

fn image_data_uri(path: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime = mime_for_extension(ext).ok_or_else(|| format!("Unsupported image type for '{}'", path.display()))?;
    let bytes = std::fs
        ::read(path)
        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?;
    Ok(DataUri::from_bytes(mime, &bytes).to_string())
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Speech Model: {}", args.speech_model);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Connect Timeout: {}s", args.connect_timeout_secs);
    info!("-------------------------");

    let mut agent = AIAgent::new(&args)?;

    match args.command.clone().unwrap_or(Command::Chat) {
        Command::Chat => console::run_chat(&mut agent, &args).await?,
        Command::Code { description } => {
            let generated = code::generate_code(&agent, &description).await?;
            println!("{}", generated);
        }
        Command::Diagnose { symptoms, image } => {
            let exam_photo_data_uri = image.as_deref().map(image_data_uri).transpose()?;
            let input = DiagnoseExamInput { exam_photo_data_uri, symptoms };
            let result = diagnosis::diagnose_exam(&agent, &input).await?;
            println!("{}\n\n{}", result.analysis, result.disclaimer);
        }
        Command::Suggest { beat, style } => {
            let input = SuggestBeatImprovementsInput { modified_beat: beat, target_style: style };
            let result = beats::suggest_beat_improvements(&agent, &input).await?;
            for (i, suggestion) in result.suggested_improvements.iter().enumerate() {
                println!("{}. {}", i + 1, suggestion);
            }
        }
        Command::Beat { style, out } => {
            let beat = beats::generate_beat(&agent, &GenerateBeatInput { style }).await?;
            std::fs::write(&out, beat.audio.decode()?)?;
            println!("Wrote {} bytes of {} to {}", beat.byte_len, beat.audio.mime_type, out.display());
        }
    }

    Ok(())
}
