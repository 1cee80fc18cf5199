use async_trait::async_trait;
use log::{ debug, info };
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use std::time::Duration;
use url::Url;

use super::{
    http_stream_generate,
    upstream_error_message,
    ChatClient,
    FragmentStream,
    GenerateRequest,
    GenerateResponse,
    Part,
    StreamChunk,
};
use crate::llm::media::DataUri;
use crate::llm::{ normalize_model_id, ChatError, LlmConfig, ResponseModality, SafetySetting };

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<JsonValue>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GoogleChunk {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
    error: Option<GoogleError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePart {
    text: Option<String>,
    inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleError {
    code: Option<u16>,
    message: String,
}

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

impl GoogleChunk {
    fn check(&self) -> Result<(), ChatError> {
        if let Some(err) = &self.error {
            return Err(ChatError::Upstream {
                status: err.code.unwrap_or(500),
                message: err.message.clone(),
            });
        }
        if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
            return Err(ChatError::Blocked(format!("prompt blocked ({})", reason)));
        }
        if let Some(reason) = self.finish_reason() {
            if BLOCKING_FINISH_REASONS.contains(&reason) {
                return Err(ChatError::Blocked(format!("generation stopped ({})", reason)));
            }
        }
        Ok(())
    }

    fn first_parts(&self) -> &[GooglePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    fn finish_reason(&self) -> Option<&str> {
        self.candidates.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/// Decodes one Server-Sent Events line of a `streamGenerateContent?alt=sse` body.
fn parse_gemini_line(line: &str) -> Result<Option<StreamChunk>, ChatError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let chunk: GoogleChunk = serde_json
        ::from_str(data)
        .map_err(|e| ChatError::Malformed(format!("{} in stream event", e)))?;
    chunk.check()?;

    Ok(
        Some(StreamChunk {
            text: chunk.text(),
            finished: chunk.finish_reason().is_some(),
        })
    )
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        connect_timeout: Duration
    ) -> Result<Self, ChatError> {
        let chat_model = model
            .as_deref()
            .map(normalize_model_id)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|e|
            ChatError::Config(format!("invalid base URL '{}': {}", base_url, e))
        )?;

        let http = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            http,
            api_key,
            model: chat_model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ChatError::Config("Google API key is required for GeminiChatClient".into()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.connect_timeout_secs)
        )
    }

    fn endpoint(&self, model: &str, method: &str) -> Result<Url, ChatError> {
        let raw = format!(
            "{}/v1beta/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            normalize_model_id(model),
            method
        );
        Url::parse(&raw).map_err(|e| ChatError::Config(format!("invalid endpoint '{}': {}", raw, e)))
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![("x-goog-api-key".to_string(), self.api_key.clone())]
    }

    fn build_payload(request: &GenerateRequest) -> Result<GeminiRequest, ChatError> {
        if request.parts.is_empty() {
            return Err(ChatError::InvalidInput("request has no content parts".into()));
        }

        let parts = request.parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart { text: Some(text.clone()), inline_data: None },
                Part::Media(media) =>
                    GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: media.mime_type.clone(),
                            data: media.data.clone(),
                        }),
                    },
            })
            .collect();

        let config = &request.config;
        Ok(GeminiRequest {
            contents: vec![GeminiContent { role: "user", parts }],
            safety_settings: config.safety_settings.clone(),
            generation_config: GeminiGenerationConfig {
                temperature: config.temperature,
                response_modalities: config.response_modalities.clone(),
                response_mime_type: config.response_mime_type.clone(),
                response_schema: config.response_schema.clone(),
                speech_config: config.speech_config.clone(),
            },
        })
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = self.endpoint(model, "generateContent")?;
        let payload = Self::build_payload(request)?;
        info!("GeminiChatClient::generate() → model={} base_url={}", model, self.base_url);

        let mut req = self.http.post(url).json(&payload);
        for (name, value) in self.headers() {
            req = req.header(name, value);
        }
        let resp = req.send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                message: upstream_error_message(&body),
            });
        }

        let chunk: GoogleChunk = serde_json
            ::from_str(&body)
            .map_err(|e| ChatError::Malformed(format!("{} in generateContent response", e)))?;
        chunk.check()?;

        let media = chunk
            .first_parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .map(|d| DataUri { mime_type: d.mime_type.clone(), data: d.data.clone() })
            .collect::<Vec<_>>();
        let text = chunk.text();
        debug!("generateContent returned {} chars and {} media part(s)", text.len(), media.len());

        Ok(GenerateResponse {
            text,
            media,
            finish_reason: chunk.finish_reason().map(str::to_string),
        })
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<FragmentStream, ChatError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let mut url = self.endpoint(model, "streamGenerateContent")?;
        url.query_pairs_mut().append_pair("alt", "sse");
        let payload = Self::build_payload(request)?;

        info!("GeminiChatClient::generate_stream() → model={} url={}", model, url);

        Ok(
            http_stream_generate(
                self.http.clone(),
                url,
                payload,
                parse_gemini_line,
                Some(self.headers())
            )
        )
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
