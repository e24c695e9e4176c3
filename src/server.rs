//! HTTP surface: the chat route that streams normalized SSE frames.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use itertools::Itertools;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, Relay};
use crate::model::RelayEvent;
use crate::providers::remote::{ChatRequest, CHAT_PATH};
use crate::sse::format_sse_chunk;
use crate::stream::DeltaStream;

/// Body sent to the browser when the relay fails before streaming.
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to get response from AI";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<dyn Relay>,
}

impl AppState {
    pub fn new(relay: impl Relay + 'static) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("relay error: {0}")]
    Relay(#[from] ClientError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Relay(e) => {
                // Full detail stays in the logs; the caller gets a generic message.
                error!(error = %e, "relay failed before streaming");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": RELAY_FAILURE_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(CHAT_PATH, post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until `shutdown` resolves.
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Relay the conversation upstream and stream deltas back as SSE frames.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    debug!(
        roles = %req.messages.iter().map(|m| m.role.as_str()).join(","),
        "chat request received"
    );

    let deltas = state.relay.relay(req.messages).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse_body(deltas),
    )
        .into_response())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// One `data: {"content":..}` frame per delta. The body ends at `Done`, at
/// the end of the stream, or after logging a mid-stream error.
fn sse_body(deltas: DeltaStream) -> Body {
    let frames = deltas.filter_map(|event| async move {
        match event {
            Ok(RelayEvent::Delta(text)) => Some(Ok::<_, Infallible>(format_sse_chunk(&text))),
            Ok(RelayEvent::Done) => None,
            Err(e) => {
                warn!(error = %e, "upstream stream ended abnormally");
                None
            }
        }
    });
    Body::from_stream(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;
    use async_trait::async_trait;
    use axum::http::Request;
    use futures::stream;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct FixedRelay(Vec<Result<RelayEvent, String>>);

    #[async_trait]
    impl Relay for FixedRelay {
        async fn relay(&self, _messages: Vec<ChatMessage>) -> Result<DeltaStream, ClientError> {
            let events: Vec<_> = self.0.iter().cloned().map(|e| e.map_err(ClientError::Config)).collect();
            Ok(DeltaStream::new(stream::iter(events)))
        }
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(CHAT_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn mid_stream_error_ends_body_after_sent_frames() {
        let app = create_router(AppState::new(FixedRelay(vec![
            Ok(RelayEvent::Delta("a".into())),
            Err("idle".into()),
        ])));

        let resp = app.oneshot(chat_request(r#"{"messages":[]}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"data: {\"content\":\"a\"}\n\n");
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(AppState::new(FixedRelay(vec![])));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_messages_is_rejected() {
        let app = create_router(AppState::new(FixedRelay(vec![])));
        let resp = app.oneshot(chat_request(r#"{}"#)).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
