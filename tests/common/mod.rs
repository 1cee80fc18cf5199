//! In-process stand-in for the Gemini REST endpoints.

#![allow(dead_code)]

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ Path, State };
use axum::http::{ HeaderMap, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::routing::post;
use axum::{ Json, Router };
use futures::stream::{ self, BoxStream, StreamExt };
use genai_relay::agent::AIAgent;
use genai_relay::config::prompt::PromptConfig;
use genai_relay::llm::chat::gemini::GeminiChatClient;
use serde_json::{ json, Value };
use tokio::net::TcpListener;

pub const TEST_KEY: &str = "test-key";

type BodyChunks = Vec<Result<Vec<u8>, std::io::Error>>;

#[derive(Clone, Debug)]
pub enum Behavior {
    /// Streams each string as one event; the last carries `finishReason`.
    Text(Vec<String>),
    /// Streams these events verbatim and closes the body.
    Events(Vec<Value>),
    /// Streams the strings, then drops the connection mid-body.
    InterruptAfter(Vec<String>),
    /// Streams the strings, then keeps the connection open with keep-alives.
    Hang(Vec<String>),
    /// Like `Text`, but keeps sending keep-alives after the final event.
    LingerAfterFinish(Vec<String>),
    /// Answers with an HTTP error and a Google-style error body.
    Reject(u16, String),
    /// `generateContent` answers with this text as the only part.
    Answer(String),
    /// `generateContent` answers with one inline media part.
    Audio {
        mime_type: String,
        data: String,
    },
    /// A completed candidate without any content.
    Empty,
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// Last path segment, e.g. `gemini-2.5-flash:streamGenerateContent`.
    pub action: String,
    pub body: Value,
}

impl RecordedRequest {
    pub fn prompt_text(&self) -> String {
        self.body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default().to_string()
    }
}

#[derive(Clone)]
pub struct MockGemini {
    pub base_url: String,
    behavior: Arc<Mutex<Behavior>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stream_released: Arc<AtomicBool>,
}

impl MockGemini {
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// True once a lingering body has been dropped by the server.
    pub fn stream_released(&self) -> bool {
        self.stream_released.load(Ordering::SeqCst)
    }

    pub fn agent(&self) -> AIAgent {
        agent_for(&self.base_url)
    }
}

pub fn agent_for(base_url: &str) -> AIAgent {
    let client = GeminiChatClient::new(
        TEST_KEY.to_string(),
        Some("googleai/gemini-2.5-flash".to_string()),
        Some(base_url.to_string()),
        Duration::from_secs(2)
    ).expect("valid client");
    AIAgent::from_parts(Arc::new(client), Arc::new(PromptConfig::default()))
}

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub fn text_chunk(text: &str, finished: bool) -> Value {
    let mut candidate = json!({
        "content": { "role": "model", "parts": [{ "text": text }] }
    });
    if finished {
        candidate["finishReason"] = json!("STOP");
    }
    json!({ "candidates": [candidate] })
}

/// Encodes one SSE event and cuts it in two so that events straddle reads.
fn sse_event(chunk: &Value) -> BodyChunks {
    let bytes = format!("data: {}\r\n\r\n", chunk).into_bytes();
    let mid = bytes.len() / 2;
    vec![Ok(bytes[..mid].to_vec()), Ok(bytes[mid..].to_vec())]
}

fn sse_events(texts: &[String], finish_last: bool) -> BodyChunks {
    texts
        .iter()
        .enumerate()
        .flat_map(|(i, t)| sse_event(&text_chunk(t, finish_last && i + 1 == texts.len())))
        .collect()
}

/// Keep-alive comments every 20ms until the server drops the body.
fn keep_alive(flag: ReleaseFlag) -> BoxStream<'static, Result<Vec<u8>, std::io::Error>> {
    stream
        ::unfold(flag, |flag| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Some((Ok::<_, std::io::Error>(b": keep-alive\n\n".to_vec()), flag))
        })
        .boxed()
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .body(body)
        .unwrap()
}

fn error_response(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    let body = json!({ "error": { "code": status.as_u16(), "message": message, "status": "UNAVAILABLE" } });
    (status, Json(body)).into_response()
}

fn stream_response(mock: &MockGemini, behavior: Behavior) -> Response {
    match behavior {
        Behavior::Reject(status, message) => error_response(status, &message),
        Behavior::Text(texts) => sse_response(Body::from_stream(stream::iter(sse_events(&texts, true)))),
        Behavior::Events(events) => {
            let chunks: BodyChunks = events.iter().flat_map(sse_event).collect();
            sse_response(Body::from_stream(stream::iter(chunks)))
        }
        Behavior::Answer(text) => sse_response(Body::from_stream(stream::iter(sse_events(&[text], true)))),
        Behavior::InterruptAfter(texts) => {
            let broken = stream::iter(sse_events(&texts, false)).chain(
                stream::once(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<Vec<u8>, _>(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream went away"))
                })
            );
            sse_response(Body::from_stream(broken))
        }
        Behavior::Hang(texts) => {
            let flag = ReleaseFlag(mock.stream_released.clone());
            sse_response(Body::from_stream(stream::iter(sse_events(&texts, false)).chain(keep_alive(flag))))
        }
        Behavior::LingerAfterFinish(texts) => {
            let flag = ReleaseFlag(mock.stream_released.clone());
            sse_response(Body::from_stream(stream::iter(sse_events(&texts, true)).chain(keep_alive(flag))))
        }
        Behavior::Empty | Behavior::Audio { .. } => {
            let done = json!({ "candidates": [{ "finishReason": "STOP" }] });
            sse_response(Body::from_stream(stream::iter(sse_event(&done))))
        }
    }
}

fn generate_response(behavior: Behavior) -> Response {
    match behavior {
        Behavior::Reject(status, message) => error_response(status, &message),
        | Behavior::Text(texts)
        | Behavior::InterruptAfter(texts)
        | Behavior::Hang(texts)
        | Behavior::LingerAfterFinish(texts) => Json(text_chunk(&texts.concat(), true)).into_response(),
        Behavior::Events(events) => {
            let text: String = events
                .iter()
                .filter_map(|e| e["candidates"][0]["content"]["parts"][0]["text"].as_str())
                .collect();
            Json(text_chunk(&text, true)).into_response()
        }
        Behavior::Answer(text) => Json(text_chunk(&text, true)).into_response(),
        Behavior::Audio { mime_type, data } => {
            let part = json!({ "inlineData": { "mimeType": mime_type, "data": data } });
            let body = json!({
                "candidates": [{ "content": { "role": "model", "parts": [part] }, "finishReason": "STOP" }]
            });
            Json(body).into_response()
        }
        Behavior::Empty => Json(json!({ "candidates": [{ "finishReason": "STOP" }] })).into_response(),
    }
}

async fn handle(
    State(mock): State<MockGemini>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>
) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(TEST_KEY) {
        return error_response(401, "API key not valid. Please pass a valid API key.");
    }
    mock.requests.lock().unwrap().push(RecordedRequest { action: action.clone(), body });
    let behavior = mock.behavior.lock().unwrap().clone();

    if action.ends_with(":streamGenerateContent") {
        stream_response(&mock, behavior)
    } else {
        generate_response(behavior)
    }
}

pub async fn spawn_mock(behavior: Behavior) -> MockGemini {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mock = MockGemini {
        base_url: format!("http://{}", addr),
        behavior: Arc::new(Mutex::new(behavior)),
        requests: Arc::new(Mutex::new(Vec::new())),
        stream_released: Arc::new(AtomicBool::new(false)),
    };

    let app = Router::new().route("/v1beta/models/{action}", post(handle)).with_state(mock.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    mock
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.to_string())
        .collect()
}
