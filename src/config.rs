//! Relay configuration, loaded from environment variables at startup.

use std::time::Duration;

use crate::options::{
    HttpTransport, ModelOptions, SecretString, TransportOptions, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};
use crate::providers::deepseek::DEFAULT_API_BASE;

/// Runtime configuration for the relay server.
///
/// Every field except the API key has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:3000"`).
    pub bind_address: String,

    /// Bearer credential for the upstream API (`DEEPSEEK_API_KEY`).
    pub api_key: Option<SecretString>,

    /// Upstream base URL; `/chat/completions` is appended.
    pub base_url: String,

    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Instruction prepended to every conversation.
    pub system_prompt: String,

    pub connect_timeout: Duration,

    /// Longest silence tolerated between upstream reads. Zero disables it.
    pub idle_timeout: Duration,

    pub proxy: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        Self {
            bind_address: env_or("RELAY_BIND", "127.0.0.1:3000"),
            api_key: lookup("DEEPSEEK_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            base_url: env_or("DEEPSEEK_BASE_URL", DEFAULT_API_BASE),
            model: env_or("RELAY_MODEL", DEFAULT_MODEL),
            temperature: parse_or(&lookup, "RELAY_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_tokens: parse_or(&lookup, "RELAY_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            system_prompt: env_or("RELAY_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            connect_timeout: Duration::from_secs(parse_or(&lookup, "RELAY_CONNECT_TIMEOUT_SECS", 10)),
            idle_timeout: Duration::from_secs(parse_or(&lookup, "RELAY_IDLE_TIMEOUT_SECS", 60)),
            proxy: lookup("RELAY_PROXY").filter(|v| !v.trim().is_empty()),
            log_level: env_or("RELAY_LOG", "info"),
            log_json: lookup("RELAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions::default()
            .with_model(self.model.clone())
            .with_instructions(self.system_prompt.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    pub fn transport_options(&self) -> TransportOptions {
        let mut http = HttpTransport {
            api_key: self.api_key.clone(),
            ..HttpTransport::default()
        }
        .with_base_url(self.base_url.clone());

        if let Some(proxy) = &self.proxy {
            http = http.with_proxy(proxy.clone());
        }

        let mut options = TransportOptions::new(http).with_connect_timeout(self.connect_timeout);
        if !self.idle_timeout.is_zero() {
            options = options.with_idle_timeout(self.idle_timeout);
        }
        options
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
