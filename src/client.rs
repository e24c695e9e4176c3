//! Core relay trait and error types.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::model::ChatMessage;
use crate::stream::DeltaStream;

/// Message used when an error response carries nothing readable.
pub const GENERIC_UPSTREAM_ERROR: &str = "Failed to fetch from upstream API";

/// Errors that can occur during relay operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("no data from upstream for {0:?}")]
    IdleTimeout(Duration),

    /// A stream line exceeded the accepted length without a terminator.
    #[error("stream line longer than {0} bytes")]
    LineTooLong(usize),

    /// The connection ended before the completion sentinel arrived.
    #[error("upstream closed the stream before completion")]
    PrematureClose,
}

impl ClientError {
    /// Build a [`ClientError::Upstream`] from a failed response body.
    ///
    /// Understands `{"message": ..}`, `{"error": {"message": ..}}` and
    /// `{"error": ".."}`; anything else yields [`GENERIC_UPSTREAM_ERROR`].
    pub fn from_error_body(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string());

        ClientError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        let nested = match self.error {
            Some(ErrorDetail::Object { message }) | Some(ErrorDetail::Text(message)) => Some(message),
            None => None,
        };
        self.message
            .filter(|m| !m.is_empty())
            .or(nested)
            .filter(|m| !m.is_empty())
    }
}

/// A relay turns a conversation into a lazily produced sequence of text
/// fragments.
///
/// Each call issues exactly one outbound request and never retries. The
/// returned [`DeltaStream`] belongs to the caller alone: it is consumed by
/// value, cannot be cloned and cannot be restarted.
///
/// The relay does not validate the conversation; an empty one is forwarded
/// as is.
///
/// # Example
/// ```rust,ignore
/// let mut deltas = relay.relay(vec![ChatMessage::user("Hello")]).await?;
/// while let Some(event) = deltas.next().await {
///     match event? {
///         RelayEvent::Delta(text) => print!("{text}"),
///         RelayEvent::Done => break,
///     }
/// }
/// ```
#[async_trait]
pub trait Relay: Send + Sync {
    /// Send the conversation and return the stream of reply fragments.
    ///
    /// Fails before any streaming starts when the request cannot be sent or
    /// the peer answers with a non-success status.
    async fn relay(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, ClientError>;
}
