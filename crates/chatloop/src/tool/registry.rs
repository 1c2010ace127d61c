//! Per-call registry of callables, keyed by name.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::{Callable, InvocationError};
use crate::chat::{ChatMessage, ToolCall};
use crate::error::LlmError;
use crate::schema::SchemaGenerator;
use crate::transport::ToolDeclaration;

/// Callables indexed by name, remembering registration order.
///
/// Registering a name twice replaces the earlier callable in place.
#[derive(Clone, Default)]
pub struct CallableRegistry {
    callables: Vec<Callable>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableRegistry")
            .field("callables", &self.names())
            .finish()
    }
}

impl CallableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable, replacing any callable with the same name.
    pub fn register(&mut self, callable: Callable) -> &mut Self {
        match self.index.get(callable.name()) {
            Some(&slot) => {
                debug!(tool = callable.name(), "replacing registered callable");
                self.callables[slot] = callable;
            }
            None => {
                self.index
                    .insert(callable.name().to_owned(), self.callables.len());
                self.callables.push(callable);
            }
        }
        self
    }

    /// Returns the callable registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.index.get(name).map(|&slot| &self.callables[slot])
    }

    /// Returns whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.callables.iter().map(Callable::name).collect()
    }

    /// Number of registered callables.
    pub fn len(&self) -> usize {
        self.callables.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }

    /// One strict-schema declaration per callable, in registration order.
    pub fn declarations(
        &self,
        generator: &dyn SchemaGenerator,
    ) -> Result<Vec<ToolDeclaration>, LlmError> {
        self.callables
            .iter()
            .map(|c| c.declaration(generator))
            .collect()
    }

    /// Runs the callable named by `call` and builds the tool message that
    /// answers it.
    ///
    /// - An unregistered name yields [`LlmError::UnknownTool`].
    /// - Arguments that don't decode yield [`LlmError::InvalidToolArguments`].
    /// - A callable that runs and fails is not an error here: its message
    ///   becomes the tool message content.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ChatMessage, LlmError> {
        let name = call.name();
        let callable = self.get(name).ok_or_else(|| LlmError::UnknownTool {
            name: name.to_owned(),
        })?;

        debug!(tool = name, call_id = %call.id, "invoking callable");
        let content = match callable.invoke(&call.function.arguments).await {
            Ok(value) => result_content(value),
            Err(InvocationError::Arguments(source)) => {
                return Err(LlmError::InvalidToolArguments {
                    tool_name: name.to_owned(),
                    source,
                });
            }
            Err(InvocationError::Failed(err)) => {
                warn!(tool = name, error = %err, "callable failed, reporting to model");
                err.message
            }
        };
        Ok(ChatMessage::tool_result(call.id.clone(), content))
    }
}

impl FromIterator<Callable> for CallableRegistry {
    fn from_iter<I: IntoIterator<Item = Callable>>(iter: I) -> Self {
        let mut registry = Self::new();
        for callable in iter {
            registry.register(callable);
        }
        registry
    }
}

/// Text content for a successful result. Strings go verbatim, everything
/// else (unit included, as `null`) is JSON-encoded.
fn result_content(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
