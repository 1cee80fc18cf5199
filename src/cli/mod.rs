use clap::{ Parser, Subcommand };
use std::path::PathBuf;

use crate::llm::DEFAULT_SPEECH_MODEL;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Model Provider Args ---
    /// API key for the Gemini API. GOOGLE_API_KEY is used when this is empty.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the Gemini REST API
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    pub chat_base_url: String,

    /// Model used for text generation (e.g., googleai/gemini-2.5-flash)
    #[arg(long, env = "CHAT_MODEL", default_value = "googleai/gemini-2.5-flash")]
    pub chat_model: String,

    /// Model used for audio generation
    #[arg(long, env = "SPEECH_MODEL", default_value = DEFAULT_SPEECH_MODEL)]
    pub speech_model: String,

    /// Seconds allowed for establishing a connection to the API. Requests themselves have no deadline.
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,

    // --- General App Args ---
    /// Path to a JSON file overriding persona text, templates and safety settings.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive conversation with streamed replies (default)
    Chat,

    /// Generate a single React component from a description
    Code {
        description: String,
    },

    /// Analyse symptoms, optionally with a photo of the exam or affected area
    Diagnose {
        #[arg(long)]
        symptoms: String,

        /// Image file (jpg, png, webp, ...)
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Suggest improvements to a beat for a target style
    Suggest {
        #[arg(long)]
        beat: String,

        #[arg(long)]
        style: String,
    },

    /// Generate a beat in the given style and write the returned audio to a file
    Beat {
        #[arg(long)]
        style: String,

        #[arg(long, default_value = "beat.pcm")]
        out: PathBuf,
    },
}

impl Args {
    pub fn resolved_api_key(&self) -> Option<String> {
        Some(self.api_key.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}
