//! The tool-call loop.

use tracing::{debug, warn};

use super::CallableRegistry;
use super::callable::Callable;
use super::config::{TerminationReason, ToolLoopConfig, ToolLoopResult};
use crate::chat::{ChatMessage, CompletionResponse, FinishReason};
use crate::error::LlmError;
use crate::transport::{CompletionParams, CompletionRequest, DynTransport};
use crate::usage::Usage;

/// Runs the model in a tool-calling loop and returns the final response.
///
/// Shorthand for [`tool_loop`] that drops everything but the response.
pub async fn run_tool_loop(
    transport: &dyn DynTransport,
    thread: Vec<ChatMessage>,
    params: CompletionParams,
    callables: Vec<Callable>,
    config: ToolLoopConfig,
) -> Result<CompletionResponse, LlmError> {
    tool_loop(transport, thread, params, callables, config)
        .await
        .map(|result| result.response)
}

/// Runs the model in a tool-calling loop.
///
/// Each iteration:
/// 1. Sends the thread, the parameters and every callable's declaration
/// 2. Stops if `choices[0]` finished for any reason other than
///    `tool_calls`, if it carries no tool calls, or if `max_iterations`
///    requests have been sent
/// 3. Otherwise appends the assistant message, runs each requested tool
///    in order, appends one tool message per call, and repeats
///
/// # Errors
///
/// - [`LlmError::InvalidRequest`] if `max_iterations` is zero or a
///   parameter schema cannot be generated, before anything is sent
/// - [`LlmError::UnknownTool`] / [`LlmError::InvalidToolArguments`] when
///   the model asks for a tool that isn't registered or sends arguments
///   that don't fit; no further request is sent
/// - any transport error, unchanged
///
/// Reaching the cap is not an error: the result carries
/// [`TerminationReason::MaxIterations`] and the last response.
pub async fn tool_loop(
    transport: &dyn DynTransport,
    thread: Vec<ChatMessage>,
    params: CompletionParams,
    callables: Vec<Callable>,
    config: ToolLoopConfig,
) -> Result<ToolLoopResult, LlmError> {
    if config.max_iterations == 0 {
        return Err(LlmError::InvalidRequest(
            "max_iterations must be at least 1".into(),
        ));
    }

    let registry: CallableRegistry = callables.into_iter().collect();
    let declarations = registry.declarations(config.schema_generator.as_ref())?;

    let mut request = CompletionRequest {
        messages: thread,
        params,
        tools: (!declarations.is_empty()).then_some(declarations),
        tool_choice: config.tool_choice.clone(),
        parallel_tool_calls: config.parallel_tool_calls,
        ..Default::default()
    };
    let mut total_usage = Usage::default();
    let mut iterations = 0u32;

    loop {
        iterations += 1;
        debug!(
            iteration = iterations,
            messages = request.messages.len(),
            "sending completion request"
        );
        let response = transport.create_completion_boxed(&request).await?;
        if let Some(usage) = &response.usage {
            total_usage += usage;
        }

        let choice = response.first_choice()?;
        if choice.finish_reason == FinishReason::Unknown {
            warn!(iteration = iterations, "unrecognised finish reason, treating as final");
        }

        let termination_reason = if choice.finish_reason != FinishReason::ToolCalls {
            Some(TerminationReason::Complete)
        } else if choice.message.tool_calls.is_empty() {
            warn!(iteration = iterations, "finish reason was tool_calls but no calls were sent");
            Some(TerminationReason::Complete)
        } else if iterations >= config.max_iterations {
            warn!(
                limit = config.max_iterations,
                "tool loop hit max_iterations while tools were still requested"
            );
            Some(TerminationReason::MaxIterations {
                limit: config.max_iterations,
            })
        } else {
            None
        };
        if let Some(termination_reason) = termination_reason {
            return Ok(ToolLoopResult {
                response,
                messages: request.messages,
                iterations,
                total_usage,
                termination_reason,
            });
        }

        let assistant = choice.message.clone();
        let calls = assistant.tool_calls.clone();
        request.messages.push(ChatMessage::Assistant(assistant));
        for call in &calls {
            let answer = registry.dispatch(call).await?;
            request.messages.push(answer);
        }
    }
}
