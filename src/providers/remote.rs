//! Client for the relay's own normalized SSE endpoint.
//!
//! Downstream frames are `data: {"content":"..."}` and carry no sentinel, so
//! the end of the response body is the completion signal here.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ClientError, Relay};
use crate::http::{build_http_client, send_with_timeout};
use crate::model::{ChatMessage, RelayEvent};
use crate::options::TransportOptions;
use crate::sse::{SSEResponseExt, SseData};
use crate::stream::DeltaStream;

/// Path of the chat route served by [`crate::server`].
pub const CHAT_PATH: &str = "/api/chat";

/// Default bound on the response headers and on each body read. The server
/// itself may wait up to its own idle timeout before answering.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay that forwards to a running chatrelay server.
pub struct RemoteRelay {
    http: reqwest::Client,
    endpoint: String,
    idle_timeout: Option<Duration>,
}

impl RemoteRelay {
    /// Create a client for the server at `base_url`, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let transport = TransportOptions::default().with_connect_timeout(CONNECT_TIMEOUT);
        Ok(Self {
            http: build_http_client(&transport)?,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CHAT_PATH),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        })
    }

    /// Bound the wait for response headers and the silence between two
    /// reads of the response body.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn process_stream<F>(frames: F) -> DeltaStream
    where
        F: Stream<Item = Result<SseData, ClientError>> + Send + 'static,
    {
        let events = frames
            .filter_map(|frame| async move {
                match frame {
                    Ok(SseData::Payload(payload)) => {
                        match serde_json::from_str::<RelayFrame>(&payload) {
                            Ok(RelayFrame { content: Some(text) }) if !text.is_empty() => {
                                Some(Ok(RelayEvent::Delta(text)))
                            }
                            Ok(_) => None,
                            Err(e) => {
                                warn!(error = %e, payload = %payload, "skipping malformed relay frame");
                                None
                            }
                        }
                    }
                    Ok(SseData::Done) => Some(Ok(RelayEvent::Done)),
                    Err(e) => Some(Err(e)),
                }
            })
            .chain(futures::stream::once(async { Ok(RelayEvent::Done) }));

        // Stop right after the first terminal item; the trailing `Done` only
        // surfaces when the body simply ended.
        let mut terminated = false;
        DeltaStream::new(events.take_while(move |event| {
            let keep = !terminated;
            terminated = !matches!(event, Ok(RelayEvent::Delta(_)));
            futures::future::ready(keep)
        }))
    }
}

#[async_trait]
impl Relay for RemoteRelay {
    async fn relay(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, ClientError> {
        debug!(endpoint = %self.endpoint, messages = messages.len(), "submitting conversation");

        let request = self.http.post(&self.endpoint).json(&ChatRequest { messages });
        let response = send_with_timeout(request, self.idle_timeout).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_error_body(status, &body));
        }

        Ok(Self::process_stream(response.sse(self.idle_timeout)))
    }
}

/// Body accepted by the chat route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct RelayFrame {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::sse::sse_data;
    use futures::stream;

    async fn run(body: &'static str) -> Vec<Result<RelayEvent, ClientError>> {
        let bytes = stream::iter(vec![Ok::<_, ClientError>(Bytes::from_static(body.as_bytes()))]);
        RemoteRelay::process_stream(sse_data(bytes, None)).collect().await
    }

    #[tokio::test]
    async fn body_end_completes_the_reply() {
        let events = run("data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\n").await;
        let events: Vec<RelayEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                RelayEvent::Delta("Hel".into()),
                RelayEvent::Delta("lo".into()),
                RelayEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn sentinel_is_honoured_once() {
        let events = run("data: {\"content\":\"a\"}\n\ndata: [DONE]\n\n").await;
        let events: Vec<RelayEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![RelayEvent::Delta("a".into()), RelayEvent::Done]);
    }

    #[tokio::test]
    async fn malformed_and_empty_frames_are_skipped() {
        let events = run("data: nope\n\ndata: {\"content\":\"\"}\n\ndata: {\"content\":\"x\"}\n\n").await;
        let events: Vec<RelayEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![RelayEvent::Delta("x".into()), RelayEvent::Done]);
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_reply() {
        let events = run("").await;
        let events: Vec<RelayEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![RelayEvent::Done]);
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let relay = RemoteRelay::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(relay.endpoint(), "http://127.0.0.1:3000/api/chat");
    }
}
