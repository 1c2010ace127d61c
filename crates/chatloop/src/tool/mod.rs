//! Tool-call orchestration.
//!
//! ```text
//!   Callable           name + description + typed parameter shape + function
//!       │
//!   CallableRegistry   callables by name; dispatches one ToolCall at a time
//!       │
//!   tool_loop()        request → run requested tools → append results → repeat
//!   run_tool_loop()    same, returning only the final response
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chatloop::tool::{run_tool_loop, Callable, ToolError, ToolLoopConfig};
//! use chatloop::{ChatMessage, CompletionParams};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, schemars::JsonSchema)]
//! struct WeatherArgs {
//!     /// City name, e.g. "Lyon".
//!     city: String,
//! }
//!
//! # async fn example(transport: &dyn chatloop::DynTransport) -> Result<(), chatloop::LlmError> {
//! let weather = Callable::from_async_fn(
//!     "get_weather",
//!     "Current temperature for a city",
//!     |args: WeatherArgs| async move {
//!         Ok::<_, ToolError>(format!("18C and sunny in {}", args.city))
//!     },
//! );
//!
//! let response = run_tool_loop(
//!     transport,
//!     vec![ChatMessage::user("What's the weather in Lyon?")],
//!     CompletionParams { model: "gpt-4o-mini".into(), ..Default::default() },
//!     vec![weather],
//!     ToolLoopConfig::default(),
//! )
//! .await?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! Tools run one at a time, in the order the model listed them, and each
//! result is appended as a `tool` message carrying the call's id. A
//! callable returning [`ToolError`] doesn't stop the loop; the error text
//! is what the model sees. An unknown tool name, or arguments that don't
//! fit the parameter type, do stop it.

mod callable;
mod config;
mod error;
mod loop_sync;
mod registry;

pub use callable::{Callable, CallableHandler, InvokeFuture};
pub use config::{TerminationReason, ToolLoopConfig, ToolLoopResult};
pub use error::{InvocationError, ToolError};
pub use loop_sync::{run_tool_loop, tool_loop};
pub use registry::CallableRegistry;

#[cfg(test)]
mod tests;
