//! Error body shapes returned by OpenAI-compatible servers.
//!
//! Request and response bodies reuse `chatloop`'s own serde types, which
//! already follow the chat-completions wire format.

use serde::Deserialize;
use serde_json::Value;

/// Top-level error envelope: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// A string on OpenAI, sometimes a number on compatible servers.
    #[serde(default)]
    pub code: Option<Value>,
}

impl ErrorDetail {
    /// The most specific code available: `code`, else `type`, else
    /// `"unknown"`.
    pub fn code(&self) -> String {
        match &self.code {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Number(code)) => code.to_string(),
            _ => self.kind.clone().unwrap_or_else(|| "unknown".into()),
        }
    }
}
