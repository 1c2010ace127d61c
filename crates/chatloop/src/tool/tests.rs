//! Tests for the tool module.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::*;
use crate::chat::{ChatMessage, ChatRole, FinishReason};
use crate::error::LlmError;
use crate::mock::MockError;
use crate::schema::{SchemarsGenerator, ShapeDescriptor};
use crate::test_helpers::{mock_with, sample_params, sample_response, sample_tool_response, tool_call};

#[derive(Deserialize, schemars::JsonSchema)]
struct AddArgs {
    a: f64,
    b: f64,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct NoArgs {}

#[derive(Serialize)]
struct Sum {
    total: f64,
}

fn add_tool() -> Callable {
    Callable::from_fn("add", "Add two numbers", |args: AddArgs| {
        Ok::<_, ToolError>(Sum {
            total: args.a + args.b,
        })
    })
}

fn fail_tool() -> Callable {
    Callable::from_fn("fail", "Always fails", |_: NoArgs| {
        Err::<(), _>(ToolError::new("intentional failure"))
    })
}

// ── Callable ────────────────────────────────────────────────────

#[test]
fn test_callable_handler_is_object_safe() {
    fn assert_object_safe(_: Option<Arc<dyn CallableHandler>>) {}
    assert_object_safe(None);
}

#[test]
fn test_tool_error_display() {
    assert_eq!(ToolError::new("boom").to_string(), "boom");
    assert_eq!(ToolError::from("x").message, "x");
}

#[test]
fn test_callable_declaration_is_strict() {
    let decl = add_tool().declaration(&SchemarsGenerator).unwrap();
    assert_eq!(decl.name(), "add");
    assert_eq!(decl.function.description.as_deref(), Some("Add two numbers"));
    let params = decl.function.parameters.as_value();
    assert_eq!(params["type"], "object");
    assert_eq!(params["additionalProperties"], false);
    assert_eq!(params["required"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_callable_invoke_typed() {
    let value = add_tool().invoke(r#"{"a": 2, "b": 3}"#).await.unwrap();
    assert_eq!(value, json!({"total": 5.0}));
}

#[tokio::test]
async fn test_callable_invoke_bad_arguments() {
    let err = add_tool().invoke(r#"{"a": "two"}"#).await.unwrap_err();
    assert!(matches!(err, InvocationError::Arguments(_)));
}

#[tokio::test]
async fn test_callable_empty_arguments_read_as_empty_object() {
    let ping = Callable::from_fn("ping", "", |_: NoArgs| Ok::<_, ToolError>("pong"));
    assert_eq!(ping.invoke("").await.unwrap(), json!("pong"));
}

#[tokio::test]
async fn test_async_callable() {
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let tool = Callable::from_async_fn("count", "Counts calls", move |_: NoArgs| {
        let counter = Arc::clone(&counter);
        async move {
            *counter.lock().unwrap() += 1;
            Ok::<_, ToolError>(())
        }
    });
    assert_eq!(tool.invoke("{}").await.unwrap(), Value::Null);
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn test_from_handler_keeps_shape() {
    struct Echo;
    impl CallableHandler for Echo {
        fn invoke<'a>(&'a self, arguments: &'a str) -> InvokeFuture<'a> {
            let value = serde_json::from_str(arguments).map_err(InvocationError::Arguments);
            Box::pin(std::future::ready(value))
        }
    }
    let tool = Callable::from_handler("echo", "Echoes", ShapeDescriptor::of::<AddArgs>(), Arc::new(Echo));
    assert_eq!(tool.parameters().name(), "AddArgs");
    assert_eq!(tool.description(), "Echoes");
}

// ── CallableRegistry ────────────────────────────────────────────

#[test]
fn test_registry_empty() {
    let registry = CallableRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert!(registry.get("add").is_none());
}

#[test]
fn test_registry_keeps_registration_order() {
    let registry: CallableRegistry = [fail_tool(), add_tool()].into_iter().collect();
    assert_eq!(registry.names(), vec!["fail", "add"]);
    let decls = registry.declarations(&SchemarsGenerator).unwrap();
    let names: Vec<&str> = decls.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["fail", "add"]);
}

#[test]
fn test_registry_overwrite_duplicate() {
    let mut registry = CallableRegistry::new();
    registry.register(add_tool()).register(fail_tool());
    registry.register(Callable::from_fn("add", "Replaced", |_: NoArgs| Ok::<_, ToolError>(0)));
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("add").unwrap().description(), "Replaced");
    assert_eq!(registry.names(), vec!["add", "fail"]);
}

#[tokio::test]
async fn test_registry_dispatch_success() {
    let registry: CallableRegistry = [add_tool()].into_iter().collect();
    let msg = registry
        .dispatch(&tool_call("call_1", "add", r#"{"a": 1, "b": 2}"#))
        .await
        .unwrap();
    assert_eq!(msg.role(), ChatRole::Tool);
    assert_eq!(msg.tool_call_id(), Some("call_1"));
    assert_eq!(msg.text(), Some(r#"{"total":3.0}"#));
}

#[tokio::test]
async fn test_registry_dispatch_string_and_unit_results() {
    let registry: CallableRegistry = [
        Callable::from_fn("greet", "", |_: NoArgs| Ok::<_, ToolError>("hello")),
        Callable::from_fn("noop", "", |_: NoArgs| Ok::<_, ToolError>(())),
    ]
    .into_iter()
    .collect();

    let greet = registry.dispatch(&tool_call("c1", "greet", "{}")).await.unwrap();
    assert_eq!(greet.text(), Some("hello"));
    let noop = registry.dispatch(&tool_call("c2", "noop", "{}")).await.unwrap();
    assert_eq!(noop.text(), Some("null"));
}

#[tokio::test]
async fn test_registry_dispatch_unknown_tool() {
    let registry = CallableRegistry::new();
    let err = registry
        .dispatch(&tool_call("c1", "nope", "{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::UnknownTool { ref name } if name == "nope"));
}

#[tokio::test]
async fn test_registry_dispatch_invalid_arguments() {
    let registry: CallableRegistry = [add_tool()].into_iter().collect();
    let err = registry
        .dispatch(&tool_call("c1", "add", "{not json"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidToolArguments { ref tool_name, .. } if tool_name == "add"));
}

#[tokio::test]
async fn test_registry_dispatch_callable_error_becomes_content() {
    let registry: CallableRegistry = [fail_tool()].into_iter().collect();
    let msg = registry.dispatch(&tool_call("c1", "fail", "{}")).await.unwrap();
    assert_eq!(msg.text(), Some("intentional failure"));
    assert_eq!(msg.tool_call_id(), Some("c1"));
}

#[test]
fn test_registry_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CallableRegistry>();
    assert_send_sync::<Callable>();
}

#[test]
fn test_registry_debug() {
    let registry: CallableRegistry = [add_tool()].into_iter().collect();
    assert!(format!("{registry:?}").contains("add"));
}

// ── tool_loop ───────────────────────────────────────────────────

#[tokio::test]
async fn test_tool_loop_no_tool_calls() {
    let mock = mock_with([sample_response("Hello!")]);
    let result = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.response.text(), Some("Hello!"));
    assert_eq!(result.iterations, 1);
    assert_eq!(result.termination_reason, TerminationReason::Complete);
    assert_eq!(result.messages, vec![ChatMessage::user("hi")]);

    let call = &mock.recorded_calls()[0];
    assert_eq!(call.params.model, "test-model");
    assert_eq!(call.tools.as_ref().unwrap()[0].name(), "add");
}

#[tokio::test]
async fn test_tool_loop_without_callables_sends_no_tools() {
    let mock = mock_with([sample_response("Hello!")]);
    tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        Vec::new(),
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();
    assert!(mock.recorded_calls()[0].tools.is_none());
}

#[tokio::test]
async fn test_tool_loop_one_iteration() {
    let mock = mock_with([
        sample_tool_response(vec![tool_call("call_1", "add", r#"{"a": 2, "b": 3}"#)]),
        sample_response("The answer is 5"),
    ]);
    let result = tool_loop(
        &mock,
        vec![ChatMessage::user("What is 2 + 3?")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.response.text(), Some("The answer is 5"));
    assert_eq!(result.iterations, 2);
    assert_eq!(result.total_usage.total_tokens, 300);

    let second = &mock.recorded_calls()[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[1].role(), ChatRole::Assistant);
    assert_eq!(second.messages[1].tool_calls()[0].id, "call_1");
    assert_eq!(second.messages[2].tool_call_id(), Some("call_1"));
    assert_eq!(second.messages[2].text(), Some(r#"{"total":5.0}"#));
    // Same declarations and parameters on every request.
    assert_eq!(second.tools, mock.recorded_calls()[0].tools);
    assert_eq!(second.params, sample_params());
}

#[tokio::test]
async fn test_tool_loop_preserves_call_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let log = Arc::clone(&log);
        Callable::from_fn("record", "Records a label", move |args: Value| {
            log.lock().unwrap().push(args["label"].as_str().unwrap_or("").to_owned());
            Ok::<_, ToolError>(())
        })
    };
    let mock = mock_with([
        sample_tool_response(vec![
            tool_call("c_b", "record", r#"{"label": "b"}"#),
            tool_call("c_a", "record", r#"{"label": "a"}"#),
            tool_call("c_c", "record", r#"{"label": "c"}"#),
        ]),
        sample_response("done"),
    ]);

    tool_loop(
        &mock,
        vec![ChatMessage::user("go")],
        sample_params(),
        vec![recorder],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["b", "a", "c"]);
    let calls = mock.recorded_calls();
    let ids: Vec<Option<&str>> = calls[1].messages[2..]
        .iter()
        .map(ChatMessage::tool_call_id)
        .collect();
    assert_eq!(ids, vec![Some("c_b"), Some("c_a"), Some("c_c")]);
}

#[tokio::test]
async fn test_tool_loop_max_iterations_is_hard_cap() {
    let mock = mock_with((0..5).map(|i| {
        sample_tool_response(vec![tool_call(&format!("c{i}"), "add", r#"{"a": 1, "b": 1}"#)])
    }));
    let result = tool_loop(
        &mock,
        vec![ChatMessage::user("loop forever")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig {
            max_iterations: 3,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(mock.call_count(), 3);
    assert_eq!(result.iterations, 3);
    assert_eq!(
        result.termination_reason,
        TerminationReason::MaxIterations { limit: 3 }
    );
    assert_eq!(result.response.finish_reason(), Some(FinishReason::ToolCalls));
    assert_eq!(result.response.tool_calls()[0].id, "c2");
}

#[tokio::test]
async fn test_tool_loop_single_iteration_executes_nothing() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let tool = Callable::from_fn("count", "", move |_: NoArgs| {
        *counter.lock().unwrap() += 1;
        Ok::<_, ToolError>(())
    });
    let mock = mock_with([sample_tool_response(vec![tool_call("c1", "count", "{}")])]);
    let response = run_tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![tool],
        ToolLoopConfig {
            max_iterations: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(response.finish_reason(), Some(FinishReason::ToolCalls));
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_tool_loop_zero_iterations_rejected() {
    let mock = mock_with([]);
    let err = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig {
            max_iterations: 0,
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::InvalidRequest(_)));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_tool_loop_unknown_tool_is_fatal() {
    let mock = mock_with([
        sample_tool_response(vec![tool_call("c1", "launch", "{}")]),
        sample_response("unreachable"),
    ]);
    let err = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::UnknownTool { ref name } if name == "launch"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_tool_loop_invalid_arguments_are_fatal() {
    let mock = mock_with([sample_tool_response(vec![tool_call("c1", "add", r#"{"a": 1}"#)])]);
    let err = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::InvalidToolArguments { .. }));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_tool_loop_callable_error_is_fed_back() {
    let mock = mock_with([
        sample_tool_response(vec![tool_call("c1", "fail", "{}")]),
        sample_response("Sorry, that failed."),
    ]);
    let result = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![fail_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.termination_reason, TerminationReason::Complete);
    let tool_msg = &mock.recorded_calls()[1].messages[2];
    assert_eq!(tool_msg.text(), Some("intentional failure"));
}

#[tokio::test]
async fn test_tool_loop_transport_error_propagates() {
    let mock = mock_with([sample_tool_response(vec![tool_call("c1", "add", r#"{"a": 1, "b": 1}"#)])]);
    mock.queue_error(MockError::Timeout { elapsed_ms: 30_000 });
    let err = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::Timeout { elapsed_ms: 30_000 }));
}

#[tokio::test]
async fn test_tool_loop_forwards_tool_choice() {
    let mock = mock_with([sample_response("ok")]);
    tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig {
            tool_choice: Some(crate::ToolChoice::Required),
            parallel_tool_calls: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let call = &mock.recorded_calls()[0];
    assert_eq!(call.tool_choice, Some(crate::ToolChoice::Required));
    assert_eq!(call.parallel_tool_calls, Some(false));
}

#[tokio::test]
async fn test_tool_loop_tool_calls_reason_without_calls_completes() {
    let mock = mock_with([
        sample_tool_response(Vec::new()),
        sample_response("never sent"),
    ]);
    let result = tool_loop(
        &mock,
        vec![ChatMessage::user("hi")],
        sample_params(),
        vec![add_tool()],
        ToolLoopConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Complete);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.response.finish_reason(), Some(FinishReason::ToolCalls));
    // No bare assistant message is appended for a later request.
    assert_eq!(result.messages, vec![ChatMessage::user("hi")]);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(mock.remaining(), 1);
}
