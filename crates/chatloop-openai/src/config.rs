//! `OpenAI` transport configuration.

use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when neither the config nor the request names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for [`OpenAiTransport`](crate::OpenAiTransport).
///
/// Use struct update syntax with [`Default`]:
///
/// ```rust
/// use chatloop_openai::OpenAiConfig;
///
/// let config = OpenAiConfig {
///     api_key: "sk-...".into(),
///     model: "gpt-4o-mini".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model used for requests whose params leave `model` empty.
    pub model: String,
    /// API root. Override for proxies, Azure, or local OpenAI-compatible
    /// servers.
    pub base_url: String,
    /// Optional organization ID, sent as `OpenAI-Organization`.
    pub organization: Option<String>,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Pre-built HTTP client to share a connection pool.
    /// When `None`, a new client is created.
    pub client: Option<reqwest::Client>,
}

impl OpenAiConfig {
    /// Reads the config from the environment.
    ///
    /// `OPENAI_API_KEY` is required; `OPENAI_BASE_URL`, `OPENAI_MODEL` and
    /// `OPENAI_ORGANIZATION` override the defaults when set and non-empty.
    /// Returns `None` when no API key is available.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Some(Self {
            api_key: non_empty("OPENAI_API_KEY")?,
            model: non_empty("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            organization: non_empty("OPENAI_ORGANIZATION"),
            ..defaults
        })
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            organization: None,
            timeout: None,
            client: None,
        }
    }
}
