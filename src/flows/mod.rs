//! One-shot flows layered on the same upstream client as the relay.

pub mod beats;
pub mod code;
pub mod diagnosis;

use serde::de::DeserializeOwned;

use crate::llm::ChatError;

/// Parses a JSON answer requested with `GenerationConfig::json_output`.
pub(crate) fn parse_json_output<T: DeserializeOwned>(flow: &str, text: &str) -> Result<T, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::NoOutput(format!("{} returned an empty answer", flow)));
    }
    serde_json
        ::from_str(trimmed)
        .map_err(|e| ChatError::Malformed(format!("{} answer is not the expected JSON: {}", flow, e)))
}
