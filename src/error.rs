//! Error types for rpc-worker.
//!
//! [`WorkerError`] covers the plumbing (I/O, codecs, configuration, startup).
//! [`HandlerError`] is what endpoint code returns; it never escapes a dispatched
//! call and is folded into a failure outcome instead.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;

use thiserror::Error;

/// Main error type for worker plumbing.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// I/O error on a transport stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// YAML rendering error (manifest export).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Protocol error (invalid frame, oversize payload, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service definition is invalid.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The cooperative scheduler could not run a task.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The setup hook failed; the service never became callable.
    #[error("Setup failed: {0}")]
    Setup(HandlerError),
}

/// Registration-time errors. These are programming errors in the service
/// definition and abort construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two endpoints share a name.
    #[error("Duplicate endpoint: {0}")]
    DuplicateEndpoint(String),
}

/// Errors from the cooperative scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The runtime or its thread could not be created.
    #[error("Failed to start scheduler: {0}")]
    Start(#[source] std::io::Error),

    /// The scheduler stopped before the task completed.
    #[error("Scheduler is closed")]
    Closed,

    /// The task panicked.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// A blocking call was made from the scheduler thread itself.
    #[error("Cannot block on the scheduler from its own thread")]
    Reentrant,
}

/// Result type alias using WorkerError.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Error raised by endpoint code.
///
/// Carries a category (the error's own type name, e.g. `ParseFloatError`), a
/// message, and the backtrace captured where it was created. Any
/// `std::error::Error` converts into it, so `?` works inside handlers.
pub struct HandlerError {
    category: String,
    message: String,
    traceback: String,
}

impl HandlerError {
    /// Create an error with an explicit category.
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            traceback: Backtrace::force_capture().to_string(),
        }
    }

    /// Create an error with the generic `Error` category.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Build from a panic payload caught at the dispatch boundary.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::new("panic", panic_message(payload))
    }

    /// Error category (type name of the original error).
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Backtrace captured at creation.
    pub fn traceback(&self) -> &str {
        &self.traceback
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("category", &self.category)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
