//! Stream consumer: folds relay events into a growing assistant reply.
//!
//! The conversation is an explicit [`Transcript`] value. Every update takes
//! the transcript by value and hands back the new one, so no state is shared
//! between submissions.

use std::fmt;

use futures::StreamExt;
use itertools::Itertools;
use tracing::warn;

use crate::client::Relay;
use crate::model::{ChatMessage, RelayEvent, Role};
use crate::stream::DeltaStream;

/// Shown in place of the reply when the relay could not be reached.
pub const FALLBACK_REPLY: &str = "Sorry, the assistant can't respond right now. Please try again later.";

/// Opening assistant message of a fresh conversation.
pub const GREETING: &str = "Hi! I'm your computer science study assistant. I can help with programming \
questions, algorithm design, system architecture and more. What are you learning right now?";

/// Ordered conversation as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self::new().push(ChatMessage::assistant(greeting))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Append a message.
    #[must_use]
    pub fn push(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Append `delta` to the most recent entry if it is an assistant reply.
    /// Otherwise the transcript is returned unchanged.
    #[must_use]
    pub fn append_to_reply(mut self, delta: &str) -> Self {
        if let Some(last) = self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
            last.content.push_str(delta);
        }
        self
    }

    /// Replace the content of the pending reply, or add one.
    #[must_use]
    pub fn set_reply(mut self, text: impl Into<String>) -> Self {
        match self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
            Some(last) => last.content = text.into(),
            None => self.messages.push(ChatMessage::assistant(text)),
        }
        self
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .join("\n\n");
        f.write_str(&rendered)
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The relay signalled completion.
    Completed,

    /// The stream broke off; the partial reply is kept.
    Interrupted(String),

    /// The relay could not be reached; the reply is [`FALLBACK_REPLY`].
    Unavailable,
}

/// Snapshot handed to the UI after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub transcript: Transcript,
    pub loading: bool,
    pub outcome: Option<Outcome>,
}

impl Exchange {
    pub fn idle(transcript: Transcript) -> Self {
        Self {
            transcript,
            loading: false,
            outcome: None,
        }
    }

    /// Text of the latest assistant entry.
    pub fn reply(&self) -> Option<&str> {
        self.transcript
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// Send `input` as the next user turn and stream the reply into the
/// transcript.
///
/// Whitespace-only input is ignored. The full history, without the pending
/// empty reply, is sent on every call. `on_update` is invoked once the empty
/// reply is in place, after each delta and when loading ends.
pub async fn submit<R, F>(relay: &R, transcript: Transcript, input: &str, mut on_update: F) -> Exchange
where
    R: Relay + ?Sized,
    F: FnMut(&Exchange),
{
    if input.trim().is_empty() {
        return Exchange::idle(transcript);
    }

    let transcript = transcript.push(ChatMessage::user(input));
    let history = transcript.messages().to_vec();

    let mut exchange = Exchange {
        transcript: transcript.push(ChatMessage::assistant("")),
        loading: true,
        outcome: None,
    };
    on_update(&exchange);

    match relay.relay(history).await {
        Ok(deltas) => consume(exchange.transcript, deltas, on_update).await,
        Err(e) => {
            warn!(error = %e, "relay request failed");
            exchange.transcript = exchange.transcript.set_reply(FALLBACK_REPLY);
            exchange.loading = false;
            exchange.outcome = Some(Outcome::Unavailable);
            on_update(&exchange);
            exchange
        }
    }
}

/// Fold a delta stream into the last assistant entry of `transcript`.
pub async fn consume<F>(transcript: Transcript, mut deltas: DeltaStream, mut on_update: F) -> Exchange
where
    F: FnMut(&Exchange),
{
    let mut exchange = Exchange {
        transcript,
        loading: true,
        outcome: None,
    };

    let outcome = loop {
        match deltas.next().await {
            Some(Ok(RelayEvent::Delta(text))) => {
                exchange.transcript = exchange.transcript.append_to_reply(&text);
                on_update(&exchange);
            }
            Some(Ok(RelayEvent::Done)) | None => break Outcome::Completed,
            Some(Err(e)) => {
                warn!(error = %e, "reply stream interrupted");
                break Outcome::Interrupted(e.to_string());
            }
        }
    };

    exchange.loading = false;
    exchange.outcome = Some(outcome);
    on_update(&exchange);
    exchange
}
