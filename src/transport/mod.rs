//! Transport adapters.
//!
//! Each adapter reads requests from a byte stream, hands
//! `(method, params)` to a [`Dispatcher`](crate::dispatch::Dispatcher) and
//! writes the [`CallOutcome`](crate::dispatch::CallOutcome) back:
//!
//! - [`serve_line`] - newline-delimited JSON, one reply per request
//! - [`serve_framed`] - 9-byte framed MsgPack with correlation ids

mod framed;
mod line;
mod writer;

use std::str::FromStr;

use serde::Deserialize;

use crate::error::WorkerError;

pub use framed::{serve_framed, METHODS, METHOD_SCHEMA, SCHEMA, SHUTDOWN};
pub use line::serve_line;
pub use writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Which transport the worker serves on stdin/stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Line,
    Framed,
}

impl FromStr for TransportKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "framed" => Ok(Self::Framed),
            other => Err(WorkerError::Config(format!("unknown transport: {other}"))),
        }
    }
}
