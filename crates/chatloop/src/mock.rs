//! Mock transport for testing.
//!
//! [`MockTransport`] is a queue-based fake: tests push the responses and
//! errors it should return, run the code under test, then inspect every
//! [`CompletionRequest`] it received. It implements
//! [`CompletionTransport`], so it also works as a `&dyn DynTransport`.
//!
//! ```rust,ignore
//! use chatloop::mock::{MockError, MockTransport};
//! use chatloop::test_helpers::sample_response;
//! use chatloop::{CompletionRequest, CompletionTransport};
//!
//! # async fn example() {
//! let mock = MockTransport::new();
//! mock.queue_response(sample_response("Hello!"))
//!     .queue_error(MockError::Timeout { elapsed_ms: 10 });
//!
//! let resp = mock.create_completion(&CompletionRequest::default()).await.unwrap();
//! assert_eq!(resp.text(), Some("Hello!"));
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! [`LlmError`] holds a `serde_json::Error` in one variant and is not
//! `Clone`, so the queue stores the cloneable [`MockError`] and converts
//! when it is popped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::chat::CompletionResponse;
use crate::error::LlmError;
use crate::transport::{CompletionRequest, CompletionTransport};

/// A queue-based fake transport.
///
/// # Panics
///
/// `create_completion` panics when the queue is empty; a test that sends
/// more requests than it scripted is a broken test.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<CompletionResponse, MockError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

/// Cloneable subset of [`LlmError`] for queuing.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Auth`].
    Auth(String),
    /// Maps to [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Maps to [`LlmError::Provider`].
    Provider {
        /// Provider error code.
        code: String,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::ResponseFormat`].
    ResponseFormat {
        /// What went wrong during decoding.
        message: String,
        /// The raw response body.
        raw: String,
    },
    /// Maps to [`LlmError::Timeout`].
    Timeout {
        /// Elapsed milliseconds.
        elapsed_ms: u64,
    },
}

impl From<MockError> for LlmError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::Http {
                status,
                message,
                retryable,
            } => Self::Http {
                status,
                message,
                retryable,
            },
            MockError::Auth(msg) => Self::Auth(msg),
            MockError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            MockError::Provider {
                code,
                message,
                retryable,
            } => Self::Provider {
                code,
                message,
                retryable,
            },
            MockError::ResponseFormat { message, raw } => Self::ResponseFormat { message, raw },
            MockError::Timeout { elapsed_ms } => Self::Timeout { elapsed_ms },
        }
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued_responses", &self.remaining())
            .field("recorded_calls", &self.call_count())
            .finish()
    }
}

impl MockTransport {
    /// Creates a mock with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a response for the next call.
    pub fn queue_response(&self, response: CompletionResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Enqueues an error for the next call.
    pub fn queue_error(&self, error: MockError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Every request received so far, in call order.
    pub fn recorded_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl CompletionTransport for MockTransport {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockTransport: no queued responses remaining");
        next.map_err(LlmError::from)
    }
}
