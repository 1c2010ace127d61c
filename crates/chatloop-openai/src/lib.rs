//! `OpenAI` chat-completions transport for `chatloop`.
//!
//! This crate implements [`CompletionTransport`](chatloop::CompletionTransport)
//! over HTTP for the `OpenAI` Chat Completions API and servers that speak
//! the same protocol (Azure, vLLM, llama.cpp, Ollama's `/v1` endpoint).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chatloop::tool::{ToolLoopConfig, run_tool_loop};
//! use chatloop::{ChatMessage, CompletionParams};
//! use chatloop_openai::OpenAiTransport;
//!
//! # async fn example() -> Result<(), chatloop::LlmError> {
//! let transport = OpenAiTransport::from_env()?;
//!
//! let response = run_tool_loop(
//!     &transport,
//!     vec![ChatMessage::user("Hello!")],
//!     CompletionParams::default(),
//!     Vec::new(),
//!     ToolLoopConfig::default(),
//! )
//! .await?;
//! println!("{}", response.text().unwrap_or("no text"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod convert;
mod transport;
mod types;

pub use config::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig};
pub use transport::OpenAiTransport;
