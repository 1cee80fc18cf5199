//! Incremental response relay.
//!
//! Turns a user prompt into a live sequence of text fragments from the model.
//! Each call is independent: nothing is remembered between invocations, so
//! callers that want multi-turn memory must put it in the prompt themselves.

use log::info;

use crate::agent::AIAgent;
use crate::config::prompt::get_chat_prompt;
use crate::llm::chat::{ FragmentStream, GenerateRequest };
use crate::llm::{ ChatError, GenerationConfig };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub prompt: String,
    /// Adds the one-time self-introduction directive to the outbound prompt.
    pub is_first_message: bool,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>, is_first_message: bool) -> Self {
        Self { prompt: prompt.into(), is_first_message }
    }
}

/// Builds the outbound request for `request` without sending it.
pub fn build_request(agent: &AIAgent, request: &PromptRequest) -> Result<GenerateRequest, ChatError> {
    if request.prompt.trim().is_empty() {
        return Err(ChatError::EmptyPrompt);
    }
    let prompts = agent.prompts();
    let text = get_chat_prompt(prompts, &request.prompt, request.is_first_message);

    Ok(GenerateRequest::text(text).with_config(GenerationConfig::with_temperature(prompts.chat_temperature)))
}

/// Opens one streaming call upstream and returns its fragments as they arrive.
///
/// Failures after the call is issued, including one before any fragment,
/// surface as the terminal item of the returned stream.
pub async fn relay_prompt(agent: &AIAgent, request: &PromptRequest) -> Result<FragmentStream, ChatError> {
    let outbound = build_request(agent, request)?;
    info!(
        "Relaying prompt ({} chars, first_message={}) to {}",
        request.prompt.chars().count(),
        request.is_first_message,
        agent.chat_client().get_model()
    );
    agent.chat_client().generate_stream(&outbound).await
}

/// Buffered counterpart of [`relay_prompt`]: same request, one response.
pub async fn complete_prompt(agent: &AIAgent, request: &PromptRequest) -> Result<String, ChatError> {
    let outbound = build_request(agent, request)?;
    let resp = agent.chat_client().generate(&outbound).await?;
    if resp.text.is_empty() {
        return Err(ChatError::NoOutput("the model returned no text".into()));
    }
    Ok(resp.text)
}
