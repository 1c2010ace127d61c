//! Conversion between `chatloop` types and the HTTP exchange.

use std::borrow::Cow;

use chatloop::chat::FinishReason;
use chatloop::{CompletionRequest, CompletionResponse, LlmError};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::OpenAiConfig;
use crate::types::{ErrorDetail, ErrorResponse};

/// Error codes a server reports in a 200 body that are worth retrying.
const RETRYABLE_CODES: &[&str] = &["server_error", "rate_limit_exceeded", "overloaded"];

/// Fills in the configured model when the request names none. Borrows the
/// request unchanged otherwise.
pub(crate) fn prepare_request<'a>(
    request: &'a CompletionRequest,
    config: &OpenAiConfig,
) -> Cow<'a, CompletionRequest> {
    if !request.params.model.is_empty() {
        return Cow::Borrowed(request);
    }
    let mut owned = request.clone();
    owned.params.model.clone_from(&config.model);
    Cow::Owned(owned)
}

/// Decodes a successful (2xx) response body.
///
/// Some compatible servers answer 200 with an `{"error": ...}` envelope;
/// that becomes [`LlmError::Provider`]. A body without choices is
/// [`LlmError::NoChoices`].
pub(crate) fn decode_response(body: String) -> Result<CompletionResponse, LlmError> {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return Err(LlmError::ResponseFormat {
                message: format!("Failed to parse OpenAI response: {e}"),
                raw: body,
            });
        }
    };

    if let Some(detail) = value
        .get("error")
        .filter(|e| !e.is_null())
        .and_then(|e| ErrorDetail::deserialize(e).ok())
    {
        return Err(provider_error(&detail));
    }

    let response = match CompletionResponse::deserialize(&value) {
        Ok(response) => response,
        Err(e) => {
            return Err(LlmError::ResponseFormat {
                message: format!("Unexpected OpenAI response shape: {e}"),
                raw: body,
            });
        }
    };

    if response.choices.is_empty() {
        return Err(LlmError::NoChoices);
    }

    for choice in &response.choices {
        if choice.finish_reason != FinishReason::Unknown {
            continue;
        }
        let raw = &value["choices"][choice.index as usize]["finish_reason"];
        if let Some(raw) = raw.as_str() {
            warn!(
                finish_reason = raw,
                "Unknown OpenAI finish_reason, treating as unknown"
            );
        }
    }

    Ok(response)
}

/// Maps a non-success HTTP status and its body to an [`LlmError`].
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |e| e.error.message);

    if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
        return LlmError::Auth(message);
    }

    if status == http::StatusCode::BAD_REQUEST {
        return LlmError::InvalidRequest(message);
    }

    let retryable = matches!(status.as_u16(), 429 | 500 | 502 | 503);

    LlmError::Http {
        status: Some(status),
        message,
        retryable,
    }
}

fn provider_error(detail: &ErrorDetail) -> LlmError {
    let code = detail.code();
    LlmError::Provider {
        retryable: RETRYABLE_CODES.contains(&code.as_str()),
        code,
        message: detail.message.clone(),
    }
}
