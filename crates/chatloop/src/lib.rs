//! # chatloop
//!
//! Conversation orchestration on top of a chat-completion endpoint.
//!
//! The crate drives two kinds of multi-turn exchange with a model:
//!
//! - the **tool-call loop** ([`tool::tool_loop`]), which runs local
//!   functions whenever the model asks for them and feeds their results
//!   back until the model is done;
//! - the **structured-output loop**
//!   ([`structured::run_structured_output`]), which coerces the model's
//!   answer into a schema-validated Rust type, retrying with feedback.
//!
//! Both sit on a single operation, [`CompletionTransport::create_completion`].
//! An OpenAI-compatible HTTP transport lives in the sibling crate
//! `chatloop-openai`.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────┐
//!              │   chatloop-openai    │  reqwest transport
//!              └──────────┬───────────┘
//!                         │ implements CompletionTransport
//!                         ▼
//!  ┌─────────────────────────────────────────────────┐
//!  │                    chatloop                     │
//!  │  tool_loop / run_structured_output              │
//!  │  CallableRegistry   SchemaGenerator             │
//!  │  ChatMessage, CompletionRequest, LlmError       │
//!  └─────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chatloop::tool::{run_tool_loop, Callable, ToolError, ToolLoopConfig};
//! use chatloop::{ChatMessage, CompletionParams};
//!
//! #[derive(serde::Deserialize, schemars::JsonSchema)]
//! struct WeatherArgs {
//!     city: String,
//! }
//!
//! # async fn example(transport: &dyn chatloop::DynTransport) -> Result<(), chatloop::LlmError> {
//! let weather = Callable::from_fn("get_weather", "Current weather", |args: WeatherArgs| {
//!     Ok::<_, ToolError>(format!("18C in {}", args.city))
//! });
//! let response = run_tool_loop(
//!     transport,
//!     vec![ChatMessage::user("What's the weather in Lyon?")],
//!     CompletionParams::default(),
//!     vec![weather],
//!     ToolLoopConfig::default(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Messages, tool calls, and completion responses |
//! | [`error`] | [`LlmError`] |
//! | [`schema`] | Schema generation from Rust types, and validation |
//! | [`structured`] | The structured-output loop |
//! | [`tool`] | Callables, the registry, and the tool-call loop |
//! | [`transport`] | The [`CompletionTransport`] trait and request types |
//! | [`usage`] | Token accounting |

#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod schema;
pub mod structured;
pub mod tool;
pub mod transport;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

// Only the types nearly every program touches are re-exported here.
// The rest stays in its module:
//
//   chatloop::chat::*        ChatRole, AssistantMessage, ContentPart
//   chatloop::transport::*   ResponseFormat, ToolDeclaration
//   chatloop::schema::*      SchemaGenerator, ShapeDescriptor, Violation
//   chatloop::tool::*        Callable, CallableRegistry, tool_loop
//   chatloop::structured::*  run_structured_output, ModelResult
//   chatloop::mock::*        MockTransport (test-utils feature)

pub use chat::{ChatMessage, CompletionResponse, FinishReason, ToolCall};
pub use error::LlmError;
pub use schema::JsonSchema;
pub use transport::{CompletionParams, CompletionRequest, CompletionTransport, DynTransport, ToolChoice};
pub use usage::Usage;
