//! Upstream relay for OpenAI-compatible Chat Completions APIs.
//!
//! Defaults target DeepSeek. The upstream stream is narrowed to a sequence of
//! text deltas followed by `Done`; model metadata and other fields are dropped.
//! See: <https://api-docs.deepseek.com/api/create-chat-completion>

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use nonempty::NonEmpty;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::client::{ClientError, Relay};
use crate::http::{build_http_client, send_with_timeout};
use crate::model::{ChatMessage, RelayEvent};
use crate::options::{ModelOptions, TransportOptions};
use crate::sse::{sse_data, SSEResponseExt, SseData};
use crate::stream::DeltaStream;

pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";

/// Relay backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct DeepSeekClient {
    http: reqwest::Client,
    model_options: ModelOptions,
    transport_options: TransportOptions,
}

impl DeepSeekClient {
    /// Create a new client. The HTTP client is built once and reused.
    pub fn new(
        model_options: ModelOptions,
        transport_options: TransportOptions,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            http,
            model_options,
            transport_options,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .transport_options
            .http
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// Re-frame a raw upstream body into relay events.
    ///
    /// Exposed so the framing can be driven without a network round trip.
    pub fn reframe<S, E>(bytes: S, idle_timeout: Option<Duration>) -> DeltaStream
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError> + Send + 'static,
    {
        Self::process_stream(sse_data(bytes, idle_timeout))
    }

    /// Map SSE payloads to relay events.
    ///
    /// Malformed payloads are logged and skipped. A stream that ends without
    /// `[DONE]` finishes with [`ClientError::PrematureClose`].
    fn process_stream<F>(frames: F) -> DeltaStream
    where
        F: Stream<Item = Result<SseData, ClientError>> + Send + 'static,
    {
        let frames: Pin<Box<F>> = Box::pin(frames);

        DeltaStream::new(stream::unfold(
            (frames, false),
            |(mut frames, finished)| async move {
                if finished {
                    return None;
                }

                loop {
                    match frames.next().await {
                        Some(Ok(SseData::Payload(payload))) => match extract_delta(&payload) {
                            Ok(Some(delta)) => {
                                return Some((Ok(RelayEvent::Delta(delta)), (frames, false)));
                            }
                            Ok(None) => debug!("upstream chunk carried no text delta"),
                            Err(e) => {
                                warn!(error = %e, payload = %payload, "skipping malformed upstream chunk");
                            }
                        },
                        Some(Ok(SseData::Done)) => {
                            return Some((Ok(RelayEvent::Done), (frames, true)));
                        }
                        Some(Err(e)) => return Some((Err(e), (frames, true))),
                        None => return Some((Err(ClientError::PrematureClose), (frames, true))),
                    }
                }
            },
        ))
    }
}

/// Extract `choices[0].delta.content` from one upstream payload.
///
/// Returns `Ok(None)` when the field is absent, null or empty.
pub fn extract_delta(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

#[async_trait]
impl Relay for DeepSeekClient {
    async fn relay(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, ClientError> {
        // Validate API key is present
        let api_key = self
            .transport_options
            .http
            .api_key
            .as_ref()
            .ok_or_else(|| ClientError::Config("API key is required".to_string()))?;

        let url = self.endpoint();
        let message_count = messages.len();
        let request_body = ChatCompletionRequest::from((messages, &self.model_options));

        debug!(url = %url, model = %request_body.model, messages = message_count, "sending completion request");

        let req = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .json(&request_body);

        let response = send_with_timeout(req, self.transport_options.idle_timeout).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ClientError::from_error_body(status, &body);
            error!(status = status.as_u16(), error = %err, "upstream rejected completion request");
            return Err(err);
        }

        Ok(Self::process_stream(
            response.sse(self.transport_options.idle_timeout),
        ))
    }
}

impl From<(Vec<ChatMessage>, &ModelOptions)> for ChatCompletionRequest {
    fn from((messages, model_options): (Vec<ChatMessage>, &ModelOptions)) -> Self {
        let conversation = NonEmpty::from((
            ChatMessage::system(model_options.instructions.clone()),
            messages,
        ));

        ChatCompletionRequest {
            model: model_options.model.clone(),
            messages: conversation.into(),
            temperature: model_options.temperature,
            top_p: model_options.top_p,
            max_tokens: model_options.max_tokens,
            stream: true,
        }
    }
}

// --- Request Types ---

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// --- Stream Types ---

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}
