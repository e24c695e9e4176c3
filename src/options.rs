//! Model and transport options for the upstream completion API.

use std::time::Duration;

/// Default upstream model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default upper bound on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// System instruction prepended to every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一位专业的计算机科学助教，擅长启发式教学。请遵循以下原则回答问题：
1. 先理解学生的问题背景和知识水平
2. 用通俗易懂的语言解释概念
3. 提供实际代码示例
4. 引导学生思考而不是直接给出答案
5. 适当提问以检验学生理解
6. 对复杂问题分步骤讲解
7. 鼓励学生动手实践";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Model behavior parameters sent with every upstream request.
///
/// # Example
/// ```rust
/// use chatrelay::options::ModelOptions;
///
/// let options = ModelOptions::default()
///     .with_temperature(0.2)
///     .with_max_tokens(512);
/// assert_eq!(options.model, "deepseek-chat");
/// ```
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Model identifier
    pub model: String,

    /// System instruction prepended to the conversation
    pub instructions: String,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Top-p (nucleus) sampling parameter
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instructions: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            top_p: None,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

impl ModelOptions {
    /// Set the model identifier.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Set the system instruction.
    pub fn with_instructions(mut self, instructions: String) -> Self {
        self.instructions = instructions;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p sampling parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// HTTP-specific transport options.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// API key for bearer authentication
    pub api_key: Option<SecretString>,

    /// Base URL for API endpoints
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,
}

impl HttpTransport {
    /// Create new HTTP transport options with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
            proxy: None,
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

/// Transport configuration: timeouts plus HTTP settings.
///
/// There is no total-request timeout. The connection phase is bounded by
/// `connect_timeout`; the wait for response headers and every gap between
/// two body reads are bounded by `idle_timeout`.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Bound on establishing the upstream connection
    pub connect_timeout: Option<Duration>,

    /// Bound on the wait for response headers and on the silence between
    /// two reads of the response body
    pub idle_timeout: Option<Duration>,

    /// HTTP transport options
    pub http: HttpTransport,
}

impl TransportOptions {
    /// Create new transport options around an HTTP transport.
    pub fn new(http: HttpTransport) -> Self {
        Self {
            connect_timeout: None,
            idle_timeout: None,
            http,
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the idle timeout for response headers and body reads.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_redacted_in_debug() {
        let transport = HttpTransport::new("sk-very-secret");
        let rendered = format!("{:?}", transport);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn model_defaults_match_upstream_contract() {
        let options = ModelOptions::default();
        assert_eq!(options.model, DEFAULT_MODEL);
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.max_tokens, Some(2000));
        assert!(options.top_p.is_none());
        assert!(!options.instructions.is_empty());
    }
}
