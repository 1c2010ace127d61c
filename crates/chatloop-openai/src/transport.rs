//! `OpenAI` [`CompletionTransport`] implementation.

use chatloop::{CompletionRequest, CompletionResponse, CompletionTransport, LlmError};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use crate::config::OpenAiConfig;
use crate::convert;

/// Chat-completions transport for `OpenAI` and compatible servers.
///
/// Sends one request per call and never retries; retry decisions belong to
/// the caller, guided by [`LlmError::is_retryable`].
///
/// # Example
///
/// ```rust,no_run
/// use chatloop::{ChatMessage, CompletionRequest, CompletionTransport};
/// use chatloop_openai::{OpenAiConfig, OpenAiTransport};
///
/// # async fn example() -> Result<(), chatloop::LlmError> {
/// let transport = OpenAiTransport::new(OpenAiConfig {
///     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     ..Default::default()
/// })?;
///
/// let response = transport
///     .create_completion(&CompletionRequest {
///         messages: vec![ChatMessage::user("Hello!")],
///         ..Default::default()
///     })
///     .await?;
/// println!("{:?}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenAiTransport {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiTransport {
    /// Creates a transport from configuration.
    ///
    /// If `config.client` is `Some`, that client is reused. Otherwise a new
    /// client is built with the configured timeout.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = match &config.client {
            Some(client) => client.clone(),
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|e| LlmError::Http {
                    status: None,
                    message: format!("failed to build HTTP client: {e}"),
                    retryable: false,
                })?
            }
        };
        Ok(Self { config, client })
    }

    /// Creates a transport from `OPENAI_*` environment variables.
    ///
    /// Fails with [`LlmError::Auth`] when `OPENAI_API_KEY` is unset.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = OpenAiConfig::from_env()
            .ok_or_else(|| LlmError::Auth("OPENAI_API_KEY is not set".into()))?;
        Self::new(config)
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn default_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            "authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        if let Some(org) = &self.config.organization {
            headers.insert(
                "openai-organization",
                HeaderValue::from_str(org).map_err(|_| {
                    LlmError::InvalidRequest(
                        "Organization ID contains invalid header characters".into(),
                    )
                })?,
            );
        }

        Ok(headers)
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn transport_error(&self, e: &reqwest::Error) -> LlmError {
        if e.is_timeout() {
            return LlmError::Timeout {
                elapsed_ms: self
                    .config
                    .timeout
                    .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            };
        }
        LlmError::Http {
            status: e.status().map(|s| {
                http::StatusCode::from_u16(s.as_u16())
                    .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
            }),
            message: e.to_string(),
            retryable: e.is_connect(),
        }
    }
}

impl CompletionTransport for OpenAiTransport {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let body = convert::prepare_request(request, &self.config);
        debug!(
            model = %body.params.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "sending chat completion"
        );

        let response = self
            .client
            .post(self.completions_url())
            .headers(self.default_headers()?)
            .json(&*body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to read OpenAI response body: {e}"),
                raw: String::new(),
            })?;

        if !status.is_success() {
            let http_status = http::StatusCode::from_u16(status.as_u16())
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
            return Err(convert::convert_error(http_status, &text));
        }

        convert::decode_response(text)
    }
}
