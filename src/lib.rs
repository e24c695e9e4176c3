//! # chatrelay - streaming chat relay
//!
//! Forwards a conversation to an OpenAI-compatible completion API and
//! re-frames its Server-Sent Events stream into a minimal one that carries
//! only text deltas.
//!
//! ## Pieces
//!
//! - **Relay** ([`client::Relay`]): one outbound request per call, returning a
//!   single-pass [`stream::DeltaStream`]. [`providers::DeepSeekClient`] talks
//!   to the upstream; [`providers::RemoteRelay`] talks to a running relay
//!   server.
//! - **Stream consumer** ([`consumer`]): folds deltas into a
//!   [`consumer::Transcript`] and tracks the loading state.
//! - **Server** ([`server`]): `POST /api/chat` answering with
//!   `data: {"content":"..."}` frames.
//!
//! ## Example
//! ```no_run
//! use chatrelay::client::Relay;
//! use chatrelay::model::ChatMessage;
//! use chatrelay::options::{HttpTransport, ModelOptions, TransportOptions};
//! use chatrelay::providers::DeepSeekClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport_options = TransportOptions::new(HttpTransport::new("your-api-key"));
//!     let client = DeepSeekClient::new(ModelOptions::default(), transport_options)?;
//!
//!     let deltas = client.relay(vec![ChatMessage::user("What is a mutex?")]).await?;
//!     println!("{}", deltas.collect_text().await?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod consumer;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod server;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ClientError, Relay};
pub use model::{ChatMessage, RelayEvent, Role};
pub use stream::DeltaStream;
