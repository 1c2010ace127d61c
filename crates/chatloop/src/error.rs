//! Unified error type for transport and orchestration failures.
//!
//! Transports map their native failures into [`LlmError`], and the
//! orchestration loops add their own fatal conditions (an unknown tool,
//! arguments that do not fit a tool's parameter shape). Recoverable
//! conditions inside the structured-output loop never surface here: they
//! are fed back to the model instead.
//!
//! # Retryability
//!
//! Transport variants carry a `retryable` flag set from the upstream
//! response (HTTP 429 or 503, say). The loops never retry transport
//! failures themselves; callers that want to can check the flag:
//!
//! ```rust
//! use chatloop::LlmError;
//!
//! fn should_retry(err: &LlmError) -> bool {
//!     match err {
//!         LlmError::Http { retryable, .. } => *retryable,
//!         LlmError::Provider { retryable, .. } => *retryable,
//!         LlmError::Timeout { .. } => true,
//!         _ => false,
//!     }
//! }
//! ```

/// The error type returned by transports and orchestration loops.
///
/// The enum is `#[non_exhaustive]`; always include a wildcard arm.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// An HTTP-level failure (transport error, unexpected status code).
    ///
    /// `status` is `None` when no response was received at all.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The API key was rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The request was malformed, or a loop was configured with a zero cap.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A provider-specific error that doesn't map to another variant.
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider-defined error code (e.g. `"server_error"`).
        code: String,
        /// Human-readable error description.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The response body could not be decoded.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong during decoding.
        message: String,
        /// The raw response body, for diagnostics.
        raw: String,
    },

    /// The server answered with an empty `choices` list.
    #[error("completion response contained no choices")]
    NoChoices,

    /// The model asked for a tool that was not registered for this call.
    #[error("model requested unknown tool '{name}'")]
    UnknownTool {
        /// The name the model used.
        name: String,
    },

    /// Tool-call arguments did not fit the tool's parameter shape.
    #[error("invalid arguments for tool '{tool_name}': {source}")]
    InvalidToolArguments {
        /// The tool whose arguments were rejected.
        tool_name: String,
        /// The decoding failure.
        source: serde_json::Error,
    },

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },
}

impl LlmError {
    /// Returns `true` if the error is transient and the request may succeed on retry.
    ///
    /// ```rust
    /// use chatloop::LlmError;
    ///
    /// let err = LlmError::Timeout { elapsed_ms: 5000 };
    /// assert!(err.is_retryable());
    ///
    /// let err = LlmError::UnknownTool { name: "nope".into() };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}
