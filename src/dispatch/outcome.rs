//! The structured result of every dispatched call.
//!
//! Wire form:
//!
//! ```text
//! {"ok": true,  "result": <value>, "done": true}
//! {"ok": false, "error": {"type": <kind>, "message": .., "traceback": .., "category": ..}, "done": true}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HandlerError;

/// Failure kinds. Callers branch on these, never on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownMethod,
    ValidationError,
    ResourceMaterializationError,
    HandlerError,
    ServiceStopped,
    DuplicateEndpoint,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ResourceMaterializationError => "ResourceMaterializationError",
            ErrorKind::HandlerError => "HandlerError",
            ErrorKind::ServiceStopped => "ServiceStopped",
            ErrorKind::DuplicateEndpoint => "DuplicateEndpoint",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Diagnostic trace; empty for failures raised by the dispatcher itself.
    pub traceback: String,
    /// Type name of the handler's error, for `HandlerError` failures.
    pub category: Option<String>,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traceback: String::new(),
            category: None,
        }
    }
}

impl From<HandlerError> for Failure {
    fn from(err: HandlerError) -> Self {
        Self {
            kind: ErrorKind::HandlerError,
            message: err.message().to_string(),
            traceback: err.traceback().to_string(),
            category: Some(err.category().to_string()),
        }
    }
}

/// Success or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(Failure),
}

/// Outcome plus the `done` flag reserved for partial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireOutcome", try_from = "WireOutcome")]
pub struct CallOutcome {
    pub outcome: Outcome,
    pub done: bool,
}

impl CallOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            outcome: Outcome::Success(result),
            done: true,
        }
    }

    pub fn failure(failure: Failure) -> Self {
        Self {
            outcome: Outcome::Failure(failure),
            done: true,
        }
    }

    /// Failure raised by the dispatcher itself, without a trace.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::failure(Failure::new(kind, message))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(v) => Some(v),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure_details(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(f) => Some(f),
        }
    }

    /// Failure kind, if the call failed.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.failure_details().map(|f| f.kind)
    }

    /// Wire form as a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(WireOutcome::from(self.clone())).unwrap_or(Value::Null)
    }
}

impl From<Result<Value, HandlerError>> for CallOutcome {
    fn from(result: Result<Value, HandlerError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::failure(err.into()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireError {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
    #[serde(default)]
    traceback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireOutcome {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
    #[serde(default = "default_done")]
    done: bool,
}

fn default_done() -> bool {
    true
}

impl From<CallOutcome> for WireOutcome {
    fn from(outcome: CallOutcome) -> Self {
        match outcome.outcome {
            Outcome::Success(value) => WireOutcome {
                ok: true,
                result: Some(value),
                error: None,
                done: outcome.done,
            },
            Outcome::Failure(f) => WireOutcome {
                ok: false,
                result: None,
                error: Some(WireError {
                    kind: f.kind,
                    message: f.message,
                    traceback: f.traceback,
                    category: f.category,
                }),
                done: outcome.done,
            },
        }
    }
}

impl TryFrom<WireOutcome> for CallOutcome {
    type Error = String;

    fn try_from(wire: WireOutcome) -> Result<Self, Self::Error> {
        let outcome = if wire.ok {
            Outcome::Success(wire.result.unwrap_or(Value::Null))
        } else {
            let err = wire
                .error
                .ok_or_else(|| "failed outcome without an error object".to_string())?;
            Outcome::Failure(Failure {
                kind: err.kind,
                message: err.message,
                traceback: err.traceback,
                category: err.category,
            })
        };
        Ok(CallOutcome {
            outcome,
            done: wire.done,
        })
    }
}
