//! Logging setup and the per-service logger.
//!
//! All diagnostics go to stderr. stdout is reserved for the line transport's
//! replies, so log records can never interleave with protocol output.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::{Result, WorkerError};

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "RPC_WORKER_LOG";

/// Log record rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(WorkerError::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default filter directive, used when `RPC_WORKER_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Install the global stderr subscriber.
///
/// Returns an error if a subscriber is already installed, which callers
/// running inside a host that configured tracing may ignore.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| WorkerError::Config(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| WorkerError::Config(format!("failed to install subscriber: {e}")))
}

/// Leveled logger tagged with the service name.
///
/// Cheap to clone; handlers get one through [`Args::logger`](crate::Args::logger).
#[derive(Clone)]
pub struct ServiceLogger {
    name: Arc<str>,
}

impl ServiceLogger {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    /// Service name attached to every record.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: &str) {
        debug!(target: "rpc_worker::service", service = %self.name, "{message}");
    }

    pub fn info(&self, message: &str) {
        info!(target: "rpc_worker::service", service = %self.name, "{message}");
    }

    pub fn warning(&self, message: &str) {
        warn!(target: "rpc_worker::service", service = %self.name, "{message}");
    }

    pub fn error(&self, message: &str) {
        error!(target: "rpc_worker::service", service = %self.name, "{message}");
    }

    /// Error-level record flagged `critical = true`.
    pub fn critical(&self, message: &str) {
        error!(target: "rpc_worker::service", service = %self.name, critical = true, "{message}");
    }

    /// Info-level record with structured extra data.
    pub fn info_with(&self, message: &str, extra: &Value) {
        info!(target: "rpc_worker::service", service = %self.name, extra = %extra, "{message}");
    }
}

impl Default for ServiceLogger {
    fn default() -> Self {
        Self::new("service")
    }
}

impl fmt::Debug for ServiceLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceLogger").field(&self.name).finish()
    }
}
