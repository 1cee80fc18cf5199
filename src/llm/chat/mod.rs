pub mod gemini;
pub mod stream;

use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, warn };
use serde::Deserialize;
use std::sync::Arc;

use self::gemini::GeminiChatClient;
use super::{ ChatError, GenerationConfig, LlmConfig };
use super::media::DataUri;

pub use self::stream::{ FragmentSender, FragmentStream };

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Media(DataUri),
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Overrides the client's configured model for this call only.
    pub model: Option<String>,
    pub parts: Vec<Part>,
    pub config: GenerationConfig,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self { parts: vec![Part::Text(prompt.into())], ..Default::default() }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_media(mut self, media: DataUri) -> Self {
        self.parts.push(Part::Media(media));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
    pub media: Vec<DataUri>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One buffered round trip.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError>;

    /// Same request, delivered incrementally. Failures after the call has been
    /// issued arrive as the stream's terminal item.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<FragmentStream, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

/// One decoded line of a streaming body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    /// Upstream marked the generation as complete.
    pub finished: bool,
}

pub type LineParser = fn(&str) -> Result<Option<StreamChunk>, ChatError>;

/// Splits a byte stream into lines. Bytes are held until a newline arrives so
/// that multi-byte characters and events cut across network reads survive.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }

    /// Whatever remains after the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pulls the human-readable message out of a `{"error": {"message": ..}}` body.
pub fn upstream_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().chars().take(512).collect(),
    }
}

struct StreamProgress {
    fragments: usize,
    finished: bool,
}

impl StreamProgress {
    /// Returns `false` once the consumer has gone away or a parse error was sent.
    async fn feed(&mut self, line: &str, line_parser: LineParser, tx: &FragmentSender) -> bool {
        match line_parser(line) {
            Ok(Some(chunk)) => {
                self.finished |= chunk.finished;
                if chunk.text.is_empty() {
                    return true;
                }
                self.fragments += 1;
                tx.send(Ok(chunk.text)).await.is_ok()
            }
            Ok(None) => true,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                false
            }
        }
    }
}

pub fn http_stream_generate(
    http: reqwest::Client,
    url: url::Url,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: LineParser,
    headers: Option<Vec<(String, String)>>
) -> FragmentStream {
    FragmentStream::spawn(move |tx| async move {
        let mut req = http.post(url).json(&payload);

        if let Some(header_list) = headers {
            for (name, value) in header_list {
                req = req.header(name, value);
            }
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Streaming request failed before a response arrived: {}", e);
                let _ = tx.send(Err(ChatError::Transport(e))).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = upstream_error_message(&body);
            warn!("Upstream answered HTTP {}: {}", status.as_u16(), message);
            let _ = tx.send(Err(ChatError::Upstream { status: status.as_u16(), message })).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut progress = StreamProgress { fragments: 0, finished: false };

        'read: while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        if !progress.feed(&line, line_parser, &tx).await {
                            return;
                        }
                        // Anything after the completion signal is ignored, keep-alives included.
                        if progress.finished {
                            break 'read;
                        }
                    }
                }
                Err(e) => {
                    warn!("Stream interrupted after {} fragment(s): {}", progress.fragments, e);
                    let _ = tx.send(Err(ChatError::Interrupted(e.to_string()))).await;
                    return;
                }
            }
        }

        if !progress.finished {
            if let Some(line) = lines.finish() {
                if !progress.feed(&line, line_parser, &tx).await {
                    return;
                }
            }
        }
        drop(bytes);

        debug!("Stream closed after {} fragment(s), finished={}", progress.fragments, progress.finished);

        if !progress.finished {
            let _ = tx.send(
                Err(ChatError::Interrupted("upstream closed the stream before completion".into()))
            ).await;
        } else if progress.fragments == 0 {
            let _ = tx.send(Err(ChatError::NoOutput("the model returned no text".into()))).await;
        }
    })
}
