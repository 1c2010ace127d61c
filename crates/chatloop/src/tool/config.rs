//! Tool loop configuration and result types.

use std::sync::Arc;

use crate::chat::{ChatMessage, CompletionResponse};
use crate::schema::{SchemaGenerator, SchemarsGenerator};
use crate::transport::ToolChoice;
use crate::usage::Usage;

/// Configuration for [`tool_loop`](super::tool_loop).
///
/// ```rust
/// use chatloop::tool::ToolLoopConfig;
///
/// let config = ToolLoopConfig {
///     max_iterations: 4,
///     ..Default::default()
/// };
/// assert_eq!(config.max_iterations, 4);
/// ```
#[derive(Clone)]
pub struct ToolLoopConfig {
    /// Maximum number of completion requests sent. Must be at least 1.
    /// Default: 10.
    pub max_iterations: u32,
    /// Produces the strict parameter schemas of the tool declarations.
    pub schema_generator: Arc<dyn SchemaGenerator>,
    /// Tool-choice directive sent with every request. Default: unset,
    /// which the server treats as `auto`.
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may request several tools in one turn. Default:
    /// unset (server default).
    pub parallel_tool_calls: Option<bool>,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            schema_generator: Arc::new(SchemarsGenerator),
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }
}

impl std::fmt::Debug for ToolLoopConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoopConfig")
            .field("max_iterations", &self.max_iterations)
            .field("tool_choice", &self.tool_choice)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .finish_non_exhaustive()
    }
}

/// Everything a finished tool loop produced.
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    /// The last response received.
    pub response: CompletionResponse,
    /// The thread as last sent, including every assistant tool-call turn
    /// and tool result appended along the way. The final response's
    /// message is not part of it.
    pub messages: Vec<ChatMessage>,
    /// How many completion requests were sent.
    pub iterations: u32,
    /// Usage summed over every response.
    pub total_usage: Usage,
    /// Why the loop ended.
    pub termination_reason: TerminationReason,
}

/// Why a tool loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model finished without requesting tools.
    Complete,
    /// The model still wanted tools when the cap was reached.
    MaxIterations {
        /// The configured cap.
        limit: u32,
    },
}
