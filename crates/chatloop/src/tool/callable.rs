//! Callables: named local functions the model may invoke.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{InvocationError, ToolError};
use crate::error::LlmError;
use crate::schema::{SchemaGenerator, ShapeDescriptor};
use crate::transport::ToolDeclaration;

/// Boxed future returned by [`CallableHandler::invoke`].
pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send + 'a>>;

/// The invocation half of a [`Callable`].
///
/// Receives the raw JSON-encoded argument string exactly as the model sent
/// it and yields the result as a JSON value. Object-safe, so handlers are
/// stored as `Arc<dyn CallableHandler>`.
///
/// Most code uses [`Callable::from_fn`] or [`Callable::from_async_fn`]
/// instead of implementing this directly.
pub trait CallableHandler: Send + Sync {
    /// Decodes `arguments` and runs the function.
    fn invoke<'a>(&'a self, arguments: &'a str) -> InvokeFuture<'a>;
}

/// A named, described local function with a typed parameter shape.
///
/// ```rust
/// use chatloop::tool::{Callable, ToolError};
///
/// #[derive(serde::Deserialize, schemars::JsonSchema)]
/// struct WeatherArgs {
///     city: String,
/// }
///
/// let weather = Callable::from_fn(
///     "get_weather",
///     "Current temperature for a city",
///     |args: WeatherArgs| -> Result<String, ToolError> { Ok(format!("18C in {}", args.city)) },
/// );
/// assert_eq!(weather.name(), "get_weather");
/// ```
#[derive(Clone)]
pub struct Callable {
    name: String,
    description: String,
    parameters: ShapeDescriptor,
    handler: Arc<dyn CallableHandler>,
}

impl Callable {
    /// Wraps a synchronous function taking typed arguments.
    pub fn from_fn<A, R, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + schemars::JsonSchema + Send + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, ToolError> + Send + Sync + 'static,
    {
        Self::from_handler(
            name,
            description,
            ShapeDescriptor::of::<A>(),
            Arc::new(SyncFn {
                f,
                _args: PhantomData,
            }),
        )
    }

    /// Wraps an async function taking typed arguments.
    pub fn from_async_fn<A, R, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Self
    where
        A: DeserializeOwned + schemars::JsonSchema + Send + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        Self::from_handler(
            name,
            description,
            ShapeDescriptor::of::<A>(),
            Arc::new(AsyncFn {
                f,
                _args: PhantomData,
            }),
        )
    }

    /// Builds a callable from a hand-written handler.
    pub fn from_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ShapeDescriptor,
        handler: Arc<dyn CallableHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    /// The unique name the model calls this by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the callable does, as shown to the model.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The shape its arguments decode into.
    pub fn parameters(&self) -> &ShapeDescriptor {
        &self.parameters
    }

    /// Builds the tool declaration the model sees, with a strict parameter
    /// schema.
    pub fn declaration(&self, generator: &dyn SchemaGenerator) -> Result<ToolDeclaration, LlmError> {
        let parameters = generator.generate(&self.parameters, true)?;
        Ok(ToolDeclaration::function(
            self.name.clone(),
            Some(self.description.clone()),
            parameters,
        ))
    }

    /// Invokes the callable with raw JSON arguments.
    pub async fn invoke(&self, arguments: &str) -> Result<Value, InvocationError> {
        self.handler.invoke(arguments).await
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Decodes arguments. Models sometimes send an empty string for functions
/// without parameters; that is read as `{}`.
fn decode_arguments<A: DeserializeOwned>(arguments: &str) -> Result<A, InvocationError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(InvocationError::Arguments)
}

fn encode_result<R: Serialize>(result: R) -> Result<Value, InvocationError> {
    serde_json::to_value(result)
        .map_err(|e| ToolError::new(format!("result could not be serialized: {e}")).into())
}

struct SyncFn<A, F> {
    f: F,
    _args: PhantomData<fn(A)>,
}

impl<A, R, F> CallableHandler for SyncFn<A, F>
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + 'static,
    F: Fn(A) -> Result<R, ToolError> + Send + Sync,
{
    fn invoke<'a>(&'a self, arguments: &'a str) -> InvokeFuture<'a> {
        let outcome = decode_arguments::<A>(arguments)
            .and_then(|args| (self.f)(args).map_err(InvocationError::from))
            .and_then(encode_result);
        Box::pin(std::future::ready(outcome))
    }
}

struct AsyncFn<A, F> {
    f: F,
    _args: PhantomData<fn(A)>,
}

impl<A, R, F, Fut> CallableHandler for AsyncFn<A, F>
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
{
    fn invoke<'a>(&'a self, arguments: &'a str) -> InvokeFuture<'a> {
        let args = match decode_arguments::<A>(arguments) {
            Ok(args) => args,
            Err(e) => return Box::pin(std::future::ready(Err(e))),
        };
        let fut = (self.f)(args);
        Box::pin(async move { encode_result(fut.await?) })
    }
}
