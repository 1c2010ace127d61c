//! Callable error types.

/// Error a callable returns when it runs but fails.
///
/// The message is sent back to the model as the tool result, so it should
/// read as something the model can act on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Human-readable error description.
    pub message: String,
}

impl ToolError {
    /// Creates a new tool error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why invoking a callable did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The arguments did not decode into the callable's parameter type.
    #[error("arguments do not match the parameter shape: {0}")]
    Arguments(#[source] serde_json::Error),
    /// The callable ran and reported a failure.
    #[error(transparent)]
    Failed(#[from] ToolError),
}
