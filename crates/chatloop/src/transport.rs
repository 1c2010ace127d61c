//! Completion transport trait and request types.
//!
//! - **[`CompletionTransport`]** is what a backend implements: one
//!   `create_completion` call, written as a native `async fn` in the trait.
//! - **[`DynTransport`]** is its object-safe mirror with boxed futures. A
//!   blanket `impl<T: CompletionTransport> DynTransport for T` bridges the
//!   two, so the loops accept `&dyn DynTransport` and any transport works.
//!
//! A [`CompletionRequest`] is a plain struct that serializes straight into
//! a chat-completions request body. Sampling knobs live in
//! [`CompletionParams`], which is flattened into the body.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize, Serializer};

use crate::chat::{ChatMessage, CompletionResponse, ToolKind};
use crate::error::LlmError;
use crate::schema::JsonSchema;

/// A backend that can answer one chat-completion request.
///
/// Implementations must not retry on their own; failures are reported as
/// [`LlmError`] and the orchestration loops propagate them unchanged.
///
/// This trait is not object-safe. Use [`DynTransport`] behind `dyn`.
pub trait CompletionTransport: Send + Sync {
    /// Sends `request` and returns the server's response.
    fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send;
}

/// Object-safe counterpart of [`CompletionTransport`].
///
/// ```rust,no_run
/// use chatloop::{ChatMessage, CompletionRequest, DynTransport};
///
/// async fn ask(transport: &dyn DynTransport, question: &str) -> Option<String> {
///     let request = CompletionRequest {
///         messages: vec![ChatMessage::user(question)],
///         ..Default::default()
///     };
///     let resp = transport.create_completion_boxed(&request).await.ok()?;
///     resp.text().map(str::to_owned)
/// }
/// ```
pub trait DynTransport: Send + Sync {
    /// Boxed-future version of [`CompletionTransport::create_completion`].
    fn create_completion_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: CompletionTransport> DynTransport for T {
    fn create_completion_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.create_completion(request))
    }
}

/// Model selection and sampling parameters.
///
/// An empty `model` means "whatever the transport is configured with".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Model identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling mass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Penalty for tokens already present, in `[-2.0, 2.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Penalty proportional to token frequency, in `[-2.0, 2.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Best-effort deterministic sampling seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Sequences at which generation stops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// End-user identifier for abuse monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A full chat-completion request.
///
/// Built with struct-update syntax:
///
/// ```rust
/// use chatloop::{ChatMessage, CompletionParams, CompletionRequest};
///
/// let request = CompletionRequest {
///     messages: vec![ChatMessage::user("Hello")],
///     params: CompletionParams {
///         model: "gpt-4o-mini".into(),
///         temperature: Some(0.2),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(request.tools.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Model and sampling parameters.
    #[serde(flatten)]
    pub params: CompletionParams,
    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDeclaration>>,
    /// Whether and which tool the model must call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Output format constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Whether the model may emit several tool calls in one turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Tool-choice directive.
///
/// Serializes as `"none"`, `"auto"`, `"required"`, or
/// `{"type": "function", "function": {"name": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ToolChoiceRepr")]
pub enum ToolChoice {
    /// The model must not call tools.
    None,
    /// The model decides.
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must call the named function.
    Function(String),
}

#[derive(Serialize)]
struct NamedFunction<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct NamedToolChoice<'a> {
    #[serde(rename = "type")]
    kind: ToolKind,
    function: NamedFunction<'a>,
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_str("none"),
            Self::Auto => serializer.serialize_str("auto"),
            Self::Required => serializer.serialize_str("required"),
            Self::Function(name) => NamedToolChoice {
                kind: ToolKind::Function,
                function: NamedFunction { name },
            }
            .serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToolChoiceRepr {
    Mode(String),
    Named { function: OwnedFunctionName },
}

#[derive(Deserialize)]
struct OwnedFunctionName {
    name: String,
}

impl TryFrom<ToolChoiceRepr> for ToolChoice {
    type Error = String;

    fn try_from(repr: ToolChoiceRepr) -> Result<Self, Self::Error> {
        match repr {
            ToolChoiceRepr::Mode(mode) => match mode.as_str() {
                "none" => Ok(Self::None),
                "auto" => Ok(Self::Auto),
                "required" => Ok(Self::Required),
                other => Err(format!("unknown tool choice '{other}'")),
            },
            ToolChoiceRepr::Named { function } => Ok(Self::Function(function.name)),
        }
    }
}

/// A tool the model may call: `{"type": "function", "function": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Always [`ToolKind::Function`].
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    /// Name, description and parameter schema.
    pub function: FunctionDeclaration,
}

impl ToolDeclaration {
    /// Declares a function tool.
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: JsonSchema,
    ) -> Self {
        Self {
            kind: ToolKind::Function,
            function: FunctionDeclaration {
                name: name.into(),
                description: description.filter(|d| !d.is_empty()),
                parameters,
            },
        }
    }

    /// The declared function name.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// The function half of a [`ToolDeclaration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Unique function name.
    pub name: String,
    /// What the function does, for the model's benefit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments object.
    pub parameters: JsonSchema,
}

/// Output format constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text.
    Text,
    /// Any syntactically valid JSON object.
    JsonObject,
    /// JSON conforming to a schema, enforced server side.
    JsonSchema {
        /// The schema and its name.
        json_schema: JsonSchemaFormat,
    },
}

/// Payload of [`ResponseFormat::JsonSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    /// Schema name.
    pub name: String,
    /// The schema itself.
    pub schema: JsonSchema,
    /// Ask the server to enforce the schema exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}
