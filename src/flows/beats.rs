use log::info;
use serde::{ Deserialize, Serialize };
use serde_json::json;

use super::parse_json_output;
use crate::agent::AIAgent;
use crate::config::prompt::{ get_beat_prompt, get_beat_suggestion_prompt };
use crate::llm::chat::GenerateRequest;
use crate::llm::media::DataUri;
use crate::llm::{ ChatError, GenerationConfig, ResponseModality };

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestBeatImprovementsInput {
    pub modified_beat: String,
    pub target_style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestBeatImprovementsOutput {
    pub suggested_improvements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateBeatInput {
    pub style: String,
}

/// Audio exactly as the model encoded it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBeat {
    pub audio: DataUri,
    pub byte_len: usize,
}

pub async fn suggest_beat_improvements(
    agent: &AIAgent,
    input: &SuggestBeatImprovementsInput
) -> Result<SuggestBeatImprovementsOutput, ChatError> {
    if input.modified_beat.trim().is_empty() || input.target_style.trim().is_empty() {
        return Err(ChatError::InvalidInput("both the beat and the target style are required".into()));
    }
    let prompts = agent.prompts();
    let schema = json!({
        "type": "OBJECT",
        "properties": {
            "suggestedImprovements": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["suggestedImprovements"]
    });
    let request = GenerateRequest::text(
        get_beat_suggestion_prompt(prompts, &input.modified_beat, &input.target_style)
    ).with_config(GenerationConfig::default().json_output(schema));

    let resp = agent.chat_client().generate(&request).await?;
    parse_json_output("beat suggestion", &resp.text)
}

pub async fn generate_beat(agent: &AIAgent, input: &GenerateBeatInput) -> Result<GeneratedBeat, ChatError> {
    if input.style.trim().is_empty() {
        return Err(ChatError::InvalidInput("a style is required".into()));
    }
    let prompts = agent.prompts();
    let request = GenerateRequest::text(get_beat_prompt(prompts, &input.style))
        .with_model(agent.speech_model())
        .with_config(GenerationConfig {
            safety_settings: prompts.beat_safety_settings.clone(),
            response_modalities: vec![ResponseModality::Audio],
            speech_config: Some(json!({})),
            ..Default::default()
        });

    let resp = agent.chat_client().generate(&request).await?;
    let audio = resp.media
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::NoOutput("No media returned from beat generation.".into()))?;
    let byte_len = audio.decode()?.len();
    info!("Beat generated: {} ({} bytes)", audio.mime_type, byte_len);

    Ok(GeneratedBeat { audio, byte_len })
}
