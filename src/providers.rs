//! Relay implementations.

pub mod deepseek;
pub mod remote;

// Re-export for convenience
pub use deepseek::DeepSeekClient;
pub use remote::RemoteRelay;
