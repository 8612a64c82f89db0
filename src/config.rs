//! Worker configuration.
//!
//! Values come from the environment in production ([`WorkerConfig::from_env`])
//! or from a JSON document. Unset keys take their defaults.
//!
//! | Variable                 | Field        | Default                 |
//! |--------------------------|--------------|-------------------------|
//! | `RPC_WORKER_STORE_URL`   | `store_url`  | `http://localhost:9800` |
//! | `RPC_WORKER_LOG_LEVEL`   | `log_level`  | `info`                  |
//! | `RPC_WORKER_LOG_FORMAT`  | `log_format` | `text`                  |
//! | `RPC_WORKER_TRANSPORT`   | `transport`  | `line`                  |

use serde::Deserialize;

use crate::error::{Result, WorkerError};
use crate::logging::{LogConfig, LogFormat};
use crate::transport::TransportKind;

pub const STORE_URL_ENV: &str = "RPC_WORKER_STORE_URL";
pub const LOG_LEVEL_ENV: &str = "RPC_WORKER_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "RPC_WORKER_LOG_FORMAT";
pub const TRANSPORT_ENV: &str = "RPC_WORKER_TRANSPORT";

pub const DEFAULT_STORE_URL: &str = "http://localhost:9800";

/// Settings for a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Base URL of the file store.
    pub store_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub transport: TransportKind,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            transport: TransportKind::Line,
        }
    }
}

impl WorkerConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(STORE_URL_ENV) {
            config.store_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(level) = get(LOG_LEVEL_ENV) {
            config.log_level = level.trim().to_string();
        }
        if let Some(format) = get(LOG_FORMAT_ENV) {
            config.log_format = format.parse()?;
        }
        if let Some(transport) = get(TRANSPORT_ENV) {
            config.transport = transport.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document such as `{"transport": "framed"}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)?;
        config.store_url = config.store_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.store_url.starts_with("http://") && !self.store_url.starts_with("https://") {
            return Err(WorkerError::Config(format!(
                "store_url must be an http(s) URL, got '{}'",
                self.store_url
            )));
        }
        Ok(())
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.store_url, "http://localhost:9800");
        assert_eq!(config.transport, TransportKind::Line);
    }

    #[test]
    fn test_env_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            (STORE_URL_ENV, "http://store:9000/"),
            (LOG_LEVEL_ENV, "debug"),
            (LOG_FORMAT_ENV, "JSON"),
            (TRANSPORT_ENV, "framed"),
        ]))
        .unwrap();

        assert_eq!(config.store_url, "http://store:9000");
        assert_eq!(config.log_config().level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.transport, TransportKind::Framed);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = WorkerConfig::from_lookup(lookup(&[(TRANSPORT_ENV, "  ")])).unwrap();
        assert_eq!(config.transport, TransportKind::Line);
    }

    #[test]
    fn test_invalid_values() {
        let err = WorkerConfig::from_lookup(lookup(&[(TRANSPORT_ENV, "carrier-pigeon")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown transport"));

        assert!(WorkerConfig::from_lookup(lookup(&[(STORE_URL_ENV, "localhost:9800")])).is_err());
    }

    #[test]
    fn test_from_json() {
        let config =
            WorkerConfig::from_json(r#"{"transport": "framed", "log_format": "json"}"#).unwrap();
        assert_eq!(config.transport, TransportKind::Framed);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.store_url, DEFAULT_STORE_URL);

        assert!(WorkerConfig::from_json(r#"{"transprot": "framed"}"#).is_err());
    }
}
