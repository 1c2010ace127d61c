//! Structured output: typed model responses validated against a schema,
//! with corrective retries.
//!
//! [`run_structured_output`] asks the model for a value of type `T`,
//! checks the answer against `T`'s JSON Schema, and when it doesn't fit
//! tells the model what was wrong and asks again, up to `max_retries`
//! requests in total.
//!
//! Two ways of asking are supported ([`OutputMode`]):
//!
//! - **Embedded schema**: the schema goes into the system message and the
//!   model answers with a JSON document as plain text.
//! - **Forced tool**: the schema is declared as the parameters of a single
//!   function the model is forced to call; the call's arguments are the
//!   answer.
//!
//! ```rust,no_run
//! use chatloop::structured::{run_structured_output, StructuredOutputConfig};
//! use chatloop::{ChatMessage, CompletionParams};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, schemars::JsonSchema)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! # async fn example(transport: &dyn chatloop::DynTransport) -> Result<(), chatloop::LlmError> {
//! let result = run_structured_output::<Person>(
//!     transport,
//!     vec![ChatMessage::user("Ana is 31 years old.")],
//!     CompletionParams::default(),
//!     StructuredOutputConfig::default(),
//! )
//! .await?;
//!
//! match result.outcome {
//!     Ok(person) => println!("{} is {}", person.name, person.age),
//!     Err(failure) => println!("gave up after {} attempts: {failure}", result.attempts),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chat::{AssistantMessage, ChatMessage, CompletionResponse, FinishReason, SystemMessage};
use crate::error::LlmError;
use crate::schema::{JsonSchema, SchemaGenerator, SchemaValidator, SchemarsGenerator, ShapeDescriptor, Violation};
use crate::transport::{
    CompletionParams, CompletionRequest, DynTransport, ResponseFormat, ToolChoice, ToolDeclaration,
};
use crate::usage::Usage;

/// How the model is asked to produce the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Schema embedded in the system message; the answer is the reply text.
    #[default]
    EmbeddedSchema,
    /// Schema declared as a function the model must call; the answer is
    /// the call's arguments.
    ForcedTool,
}

/// Configuration for [`run_structured_output`].
#[derive(Clone)]
pub struct StructuredOutputConfig {
    /// Default: [`OutputMode::EmbeddedSchema`].
    pub mode: OutputMode,
    /// Maximum number of requests sent. Must be at least 1. Default: 3.
    pub max_retries: u32,
    /// Schema / function name. Default: the type's own schema name.
    pub name: Option<String>,
    /// Function description in forced-tool mode.
    pub description: Option<String>,
    /// In embedded mode, also request a `json_object` response format.
    /// Default: true.
    pub json_response_format: bool,
    /// Produces the (lenient) schema of the target type.
    pub schema_generator: Arc<dyn SchemaGenerator>,
}

impl Default for StructuredOutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            max_retries: 3,
            name: None,
            description: None,
            json_response_format: true,
            schema_generator: Arc::new(SchemarsGenerator),
        }
    }
}

impl fmt::Debug for StructuredOutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredOutputConfig")
            .field("mode", &self.mode)
            .field("max_retries", &self.max_retries)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("json_response_format", &self.json_response_format)
            .finish_non_exhaustive()
    }
}

/// Why a structured-output call produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModelFailure {
    /// The model stopped for a reason other than `stop`. Not retried.
    #[error("finish reason not STOP")]
    FinishReasonNotStop(FinishReason),
    /// Every allowed request produced an unusable answer.
    #[error("max retries reached")]
    MaxRetriesReached,
}

/// Result of [`run_structured_output`].
///
/// `outcome` holds either the validated value or the failure, never both.
#[derive(Debug, Clone)]
pub struct ModelResult<T> {
    /// The last response received.
    pub response: CompletionResponse,
    /// The value, or why there is none.
    pub outcome: Result<T, ModelFailure>,
    /// How many requests were sent.
    pub attempts: u32,
    /// Usage summed over every response.
    pub usage: Usage,
}

impl<T> ModelResult<T> {
    /// True when a value was produced.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The value, if one was produced.
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if no value was produced.
    pub fn error(&self) -> Option<&ModelFailure> {
        self.outcome.as_ref().err()
    }

    /// Consumes the result, returning the value if there is one.
    pub fn into_value(self) -> Option<T> {
        self.outcome.ok()
    }
}

/// Asks the model for a `T`, validating and retrying with feedback.
///
/// Each attempt sends one request. A reply that isn't JSON, breaks the
/// schema, doesn't deserialize, or (in forced-tool mode) calls the wrong
/// function gets the offending assistant message and a corrective user
/// message appended to the thread before the next attempt. A finish
/// reason other than `stop` ends the call immediately.
///
/// # Errors
///
/// - [`LlmError::InvalidRequest`] if `max_retries` is zero or the schema
///   cannot be generated or compiled, before anything is sent
/// - [`LlmError::NoChoices`] and any other transport error, unchanged
///
/// Running out of retries is not an error; see [`ModelFailure`].
pub async fn run_structured_output<T>(
    transport: &dyn DynTransport,
    thread: Vec<ChatMessage>,
    params: CompletionParams,
    config: StructuredOutputConfig,
) -> Result<ModelResult<T>, LlmError>
where
    T: DeserializeOwned + schemars::JsonSchema,
{
    if config.max_retries == 0 {
        return Err(LlmError::InvalidRequest(
            "max_retries must be at least 1".into(),
        ));
    }

    let shape = ShapeDescriptor::of::<T>();
    let schema = config.schema_generator.generate(&shape, false)?;
    let validator = schema.validator()?;
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| shape.name().into_owned());

    let mut request = match config.mode {
        OutputMode::EmbeddedSchema => CompletionRequest {
            messages: embed_schema(thread, &name, &schema),
            params,
            response_format: config
                .json_response_format
                .then_some(ResponseFormat::JsonObject),
            ..Default::default()
        },
        OutputMode::ForcedTool => CompletionRequest {
            messages: thread,
            params,
            tools: Some(vec![ToolDeclaration::function(
                name.clone(),
                config.description.clone(),
                schema.clone(),
            )]),
            tool_choice: Some(ToolChoice::Function(name.clone())),
            ..Default::default()
        },
    };

    let mut usage = Usage::default();
    let mut attempts = 0;

    loop {
        attempts += 1;
        debug!(attempt = attempts, mode = ?config.mode, "requesting structured output");
        let response = transport.create_completion_boxed(&request).await?;
        if let Some(u) = &response.usage {
            usage += u;
        }

        let choice = response.first_choice()?;
        if choice.finish_reason != FinishReason::Stop {
            let finish_reason = choice.finish_reason;
            debug!(?finish_reason, "structured output stopped early");
            return Ok(ModelResult {
                response,
                outcome: Err(ModelFailure::FinishReasonNotStop(finish_reason)),
                attempts,
                usage,
            });
        }

        let message = choice.message.clone();
        let rejection = match extract::<T>(config.mode, &name, &message, &validator) {
            Ok(value) => {
                return Ok(ModelResult {
                    response,
                    outcome: Ok(value),
                    attempts,
                    usage,
                });
            }
            Err(rejection) => rejection,
        };
        debug!(attempt = attempts, %rejection, "structured output rejected");

        if attempts >= config.max_retries {
            warn!(max_retries = config.max_retries, "structured output gave up");
            return Ok(ModelResult {
                response,
                outcome: Err(ModelFailure::MaxRetriesReached),
                attempts,
                usage,
            });
        }

        request.messages.push(ChatMessage::Assistant(message));
        request
            .messages
            .push(ChatMessage::user(rejection.feedback(config.mode, &name)));
    }
}

/// Why one answer was not accepted.
#[derive(Debug)]
enum Rejection {
    /// Forced-tool mode only: no call, or a call to another function.
    WrongFunction { called: Option<String> },
    /// Not JSON, or JSON that doesn't deserialize into `T`.
    Malformed(String),
    /// JSON that breaks the schema.
    Invalid(Vec<Violation>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongFunction { called: None } => f.write_str("no function call"),
            Self::WrongFunction { called: Some(n) } => write!(f, "called function '{n}'"),
            Self::Malformed(detail) => write!(f, "malformed: {detail}"),
            Self::Invalid(violations) => write!(f, "{} schema violation(s)", violations.len()),
        }
    }
}

impl Rejection {
    /// The corrective user message for this rejection.
    fn feedback(&self, mode: OutputMode, name: &str) -> String {
        match (self, mode) {
            (Self::WrongFunction { called: Some(other) }, _) => format!(
                "You called the function `{other}`, which does not exist. \
                 Recall the function correctly: call `{name}` with arguments \
                 that conform to its parameter schema."
            ),
            (Self::WrongFunction { called: None }, _) => format!(
                "You did not call any function. Recall the function correctly: \
                 call `{name}` with arguments that conform to its parameter schema."
            ),
            (Self::Malformed(detail), OutputMode::EmbeddedSchema) => format!(
                "Your response could not be parsed as a valid `{name}` JSON object: {detail}\n\
                 Respond again with only the JSON object."
            ),
            (Self::Malformed(detail), OutputMode::ForcedTool) => format!(
                "Recall the function correctly, the arguments could not be parsed: {detail}"
            ),
            (Self::Invalid(violations), mode) => {
                let header = match mode {
                    OutputMode::EmbeddedSchema => "Validation errors found:",
                    OutputMode::ForcedTool => "Recall the function correctly, validation errors found:",
                };
                let mut text = header.to_owned();
                for violation in violations {
                    text.push_str("\n- ");
                    text.push_str(&violation.to_string());
                }
                text
            }
        }
    }
}

/// Pulls the candidate JSON out of `message` and turns it into a `T`.
fn extract<T: DeserializeOwned>(
    mode: OutputMode,
    name: &str,
    message: &AssistantMessage,
    validator: &SchemaValidator,
) -> Result<T, Rejection> {
    let raw = match mode {
        OutputMode::EmbeddedSchema => message.content.as_deref().ok_or_else(|| {
            Rejection::Malformed("the response contained no text".into())
        })?,
        OutputMode::ForcedTool => {
            let call = message
                .tool_calls
                .first()
                .ok_or(Rejection::WrongFunction { called: None })?;
            if call.name() != name {
                return Err(Rejection::WrongFunction {
                    called: Some(call.name().to_owned()),
                });
            }
            call.function.arguments.as_str()
        }
    };

    let value: Value =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| Rejection::Malformed(e.to_string()))?;
    let violations = validator.violations(&value);
    if !violations.is_empty() {
        return Err(Rejection::Invalid(violations));
    }
    serde_json::from_value(value).map_err(|e| Rejection::Malformed(e.to_string()))
}

/// Strips a surrounding Markdown code fence, which models add to JSON
/// replies despite being told not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body).trim();
    // Drop an info string such as "json", with or without a line break.
    let rest = body.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if rest.len() < body.len() {
        let rest = rest.trim_start();
        if rest.starts_with(['{', '[']) {
            return rest;
        }
    }
    body
}

/// Puts the schema instruction into the leading system message,
/// prepending one if the thread has none.
fn embed_schema(thread: Vec<ChatMessage>, name: &str, schema: &JsonSchema) -> Vec<ChatMessage> {
    let schema_json = serde_json::to_string_pretty(schema.as_value())
        .unwrap_or_else(|_| schema.as_value().to_string());
    let instruction = format!(
        "Respond with a JSON object named `{name}` that conforms to this JSON Schema:\n\
         ```json\n{schema_json}\n```\n\
         Respond ONLY with the JSON object. No markdown, no explanation."
    );

    let mut messages = Vec::with_capacity(thread.len() + 1);
    let mut rest = thread.into_iter().peekable();
    match rest.next_if(|m| matches!(m, ChatMessage::System(_))) {
        Some(ChatMessage::System(system)) => messages.push(ChatMessage::System(SystemMessage {
            content: format!("{}\n\n{instruction}", system.content),
            ..system
        })),
        _ => messages.push(ChatMessage::system(instruction)),
    }
    messages.extend(rest);
    messages
}
