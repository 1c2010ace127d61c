//! Pre-built values for testing code that drives the loops.
//!
//! Available with the `test-utils` feature so downstream crates can reuse
//! them, and always compiled for this crate's own tests.

use crate::chat::{AssistantMessage, Choice, CompletionResponse, FinishReason, ToolCall};
use crate::mock::MockTransport;
use crate::transport::CompletionParams;
use crate::usage::Usage;

/// A response whose only choice is `message`, finished for `finish_reason`.
pub fn response_with(finish_reason: FinishReason, message: AssistantMessage) -> CompletionResponse {
    CompletionResponse {
        id: "chatcmpl-test".into(),
        created: 1_700_000_000,
        model: "test-model".into(),
        choices: vec![Choice {
            index: 0,
            finish_reason,
            message,
        }],
        usage: Some(sample_usage()),
        system_fingerprint: None,
    }
}

/// A plain-text response that finished with `stop`.
pub fn sample_response(text: &str) -> CompletionResponse {
    response_with(
        FinishReason::Stop,
        AssistantMessage {
            content: Some(text.into()),
            ..Default::default()
        },
    )
}

/// A response requesting `calls`, finished with `tool_calls`.
pub fn sample_tool_response(calls: Vec<ToolCall>) -> CompletionResponse {
    response_with(
        FinishReason::ToolCalls,
        AssistantMessage {
            tool_calls: calls,
            ..Default::default()
        },
    )
}

/// A response carrying `calls` that finished with `stop`, the shape a
/// forced tool choice produces.
pub fn sample_forced_call_response(calls: Vec<ToolCall>) -> CompletionResponse {
    response_with(
        FinishReason::Stop,
        AssistantMessage {
            tool_calls: calls,
            ..Default::default()
        },
    )
}

/// Shorthand for [`ToolCall::function`].
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall::function(id, name, arguments)
}

/// 100 prompt / 50 completion tokens.
pub fn sample_usage() -> Usage {
    Usage::new(100, 50)
}

/// Parameters naming `test-model` and nothing else.
pub fn sample_params() -> CompletionParams {
    CompletionParams {
        model: "test-model".into(),
        ..Default::default()
    }
}

/// A [`MockTransport`] preloaded with `responses`.
pub fn mock_with(responses: impl IntoIterator<Item = CompletionResponse>) -> MockTransport {
    let mock = MockTransport::new();
    for response in responses {
        mock.queue_response(response);
    }
    mock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_response_is_stop() {
        let r = sample_response("hello");
        assert_eq!(r.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(r.text(), Some("hello"));
        assert_eq!(r.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_sample_tool_response() {
        let r = sample_tool_response(vec![tool_call("c1", "search", r#"{"q":"rust"}"#)]);
        assert_eq!(r.finish_reason(), Some(FinishReason::ToolCalls));
        assert_eq!(r.tool_calls().len(), 1);
        assert!(r.text().is_none());
    }

    #[test]
    fn test_mock_with_preloads() {
        let mock = mock_with([sample_response("a"), sample_response("b")]);
        assert_eq!(mock.remaining(), 2);
    }
}
