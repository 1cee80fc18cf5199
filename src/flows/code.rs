use log::info;

use crate::agent::AIAgent;
use crate::config::prompt::get_code_prompt;
use crate::llm::chat::GenerateRequest;
use crate::llm::{ ChatError, GenerationConfig };

const FENCE_MARKERS: &[&str] = &["```tsx", "```javascript", "```"];

/// Removes Markdown code fences the model may wrap its answer in.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_MARKERS.iter()
        .fold(text.to_string(), |acc, marker| acc.replace(marker, ""))
        .trim()
        .to_string()
}

pub async fn generate_code(agent: &AIAgent, description: &str) -> Result<String, ChatError> {
    if description.trim().is_empty() {
        return Err(ChatError::EmptyPrompt);
    }
    let prompts = agent.prompts();
    let request = GenerateRequest::text(get_code_prompt(prompts, description)).with_config(
        GenerationConfig::with_temperature(prompts.code_temperature)
    );

    let resp = agent.chat_client().generate(&request).await?;
    let code = strip_code_fences(&resp.text);
    if code.is_empty() {
        return Err(ChatError::NoOutput("the model returned no code".into()));
    }
    info!("Generated component code ({} lines)", code.lines().count());
    Ok(code)
}
