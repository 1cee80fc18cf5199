use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::{ LlmConfig, DEFAULT_SPEECH_MODEL };

/// Process-wide configuration: the upstream client and the prompt set.
///
/// Built once at start-up and handed by reference to every relay and flow
/// call. Cloning is cheap and shares the same client and connection pool.
#[derive(Clone)]
pub struct AIAgent {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    speech_model: String,
}

impl AIAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig {
            api_key: args.resolved_api_key(),
            completion_model: Some(args.chat_model.clone()),
            base_url: Some(args.chat_base_url.clone()),
            connect_timeout_secs: args.connect_timeout_secs,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Model={}, BaseURL={}",
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let prompt_config = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => {
                info!("No prompts file configured, using built-in prompts");
                Arc::new(PromptConfig::default())
            }
        };

        Ok(Self::from_parts(chat_client, prompt_config).with_speech_model(&args.speech_model))
    }

    pub fn from_parts(chat_client: Arc<dyn ChatClient>, prompt_config: Arc<PromptConfig>) -> Self {
        Self {
            chat_client,
            prompt_config,
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }

    pub fn with_speech_model(mut self, model: &str) -> Self {
        self.speech_model = model.to_string();
        self
    }

    pub fn chat_client(&self) -> &Arc<dyn ChatClient> {
        &self.chat_client
    }

    pub fn prompts(&self) -> &PromptConfig {
        &self.prompt_config
    }

    pub fn speech_model(&self) -> &str {
        &self.speech_model
    }

    /// Swaps in a newer prompt file if it changed on disk. Returns whether it did.
    pub fn reload_prompts_if_changed(&mut self, args: &Args) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let Some(path) = &args.prompts_path else {
            return Ok(false);
        };
        match prompt::reload_prompts_if_changed(path, &self.prompt_config)? {
            Some(new_config) => {
                self.prompt_config = new_config;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
