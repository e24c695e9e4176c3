//! The single-pass stream of reply fragments handed out by a relay.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};

use crate::client::ClientError;
use crate::model::RelayEvent;

/// Lazily produced, finite, non-restartable sequence of [`RelayEvent`]s.
///
/// Owned by exactly one reader. Implementations end the stream right after
/// yielding `RelayEvent::Done` or an error.
pub struct DeltaStream {
    inner: BoxStream<'static, Result<RelayEvent, ClientError>>,
}

impl DeltaStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<RelayEvent, ClientError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Drain the stream and concatenate every delta in arrival order.
    ///
    /// Stops at `Done`; returns the first error encountered.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event? {
                RelayEvent::Delta(delta) => text.push_str(&delta),
                RelayEvent::Done => break,
            }
        }
        Ok(text)
    }
}

impl Stream for DeltaStream {
    type Item = Result<RelayEvent, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeltaStream")
    }
}
