pub mod chat;
pub mod media;

use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors surfaced by the upstream client and everything layered on top of it.
///
/// Transport-level failures (`Transport`, `Interrupted`) are kept apart from
/// "the model answered but produced nothing usable" (`NoOutput`, `Blocked`,
/// `Malformed`) so callers can word their user-facing message accordingly.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("prompt text is empty")]
    EmptyPrompt,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream rejected the request (HTTP {status}): {message}")]
    Upstream {
        status: u16,
        message: String,
    },

    #[error("response blocked by the model: {0}")]
    Blocked(String),

    #[error("no output produced: {0}")]
    NoOutput(String),

    #[error("stream interrupted: {0}")]
    Interrupted(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
}

impl ChatError {
    /// True when the failure came from the network rather than from the model.
    pub fn is_transport(&self) -> bool {
        matches!(self, ChatError::Transport(_) | ChatError::Interrupted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    pub fn new(category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        Self { category, threshold }
    }

    /// Disables blocking for every category.
    pub fn permissive() -> Vec<SafetySetting> {
        [
            HarmCategory::DangerousContent,
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
        ]
            .into_iter()
            .map(|category| SafetySetting::new(category, HarmBlockThreshold::BlockNone))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseModality {
    Text,
    Audio,
    Image,
}

/// Recognised generation options. Anything left unset is omitted from the
/// outbound request so the upstream default applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub safety_settings: Vec<SafetySetting>,
    pub response_modalities: Vec<ResponseModality>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<JsonValue>,
    pub speech_config: Option<JsonValue>,
}

impl GenerationConfig {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature: Some(temperature), ..Default::default() }
    }

    /// Requests a JSON answer matching `schema`.
    pub fn json_output(mut self, schema: JsonValue) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self.response_schema = Some(schema);
        self
    }
}

/// Model that answers audio-modality requests unless one is configured.
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: None,
            base_url: None,
            connect_timeout_secs: 10,
        }
    }
}

/// Accepts both bare model ids and the `googleai/`-qualified form.
pub fn normalize_model_id(model: &str) -> &str {
    let model = model.trim();
    model.strip_prefix("googleai/").unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_settings_use_upstream_names() {
        let json = serde_json
            ::to_value(SafetySetting::new(HarmCategory::HateSpeech, HarmBlockThreshold::BlockOnlyHigh))
            .unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HATE_SPEECH");
        assert_eq!(json["threshold"], "BLOCK_ONLY_HIGH");

        let back: SafetySetting = serde_json
            ::from_str(
                r#"{"category":"HARM_CATEGORY_SEXUALLY_EXPLICIT","threshold":"BLOCK_LOW_AND_ABOVE"}"#
            )
            .unwrap();
        assert_eq!(back.category, HarmCategory::SexuallyExplicit);
        assert_eq!(back.threshold, HarmBlockThreshold::BlockLowAndAbove);
    }

    #[test]
    fn permissive_covers_all_categories() {
        let settings = SafetySetting::permissive();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s.threshold == HarmBlockThreshold::BlockNone));
    }

    #[test]
    fn model_prefix_is_stripped() {
        assert_eq!(normalize_model_id("googleai/gemini-2.5-flash"), "gemini-2.5-flash");
        assert_eq!(normalize_model_id("gemini-2.5-flash"), "gemini-2.5-flash");
    }

    #[test]
    fn transport_classification() {
        assert!(ChatError::Interrupted("eof".into()).is_transport());
        assert!(!ChatError::NoOutput("none".into()).is_transport());
    }
}
