//! The coerced argument bag handed to endpoint handlers.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::resource::{AudioClip, FilePath, ImageFrame, Resource};
use crate::error::HandlerError;
use crate::logging::ServiceLogger;

/// One coerced argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Plain JSON value, validated against its declared shape.
    Value(Value),
    /// Materialized resource.
    Resource(Resource),
}

/// Validated, defaulted and materialized arguments for one call.
///
/// Accessors return [`HandlerError`]s so handlers can use `?` directly.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<String, Arg>,
    logger: ServiceLogger,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a plain value.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, Arg::Value(value.into()));
        self
    }

    pub fn insert(&mut self, name: &str, arg: Arg) {
        self.values.insert(name.to_string(), arg);
    }

    pub(crate) fn set_logger(&mut self, logger: ServiceLogger) {
        self.logger = logger;
    }

    /// Logger tagged with the service name.
    pub fn logger(&self) -> &ServiceLogger {
        &self.logger
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw coerced argument.
    pub fn raw(&self, name: &str) -> Option<&Arg> {
        self.values.get(name)
    }

    /// Deserialize a plain value argument.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        match self.values.get(name) {
            Some(Arg::Value(v)) => serde_json::from_value(v.clone()).map_err(|e| {
                HandlerError::new("ArgumentError", format!("argument '{name}': {e}"))
            }),
            Some(Arg::Resource(_)) => Err(HandlerError::new(
                "ArgumentError",
                format!("argument '{name}' is a resource, not a value"),
            )),
            None => Err(missing(name)),
        }
    }

    /// Like [`get`](Self::get), but absent or null yields `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, HandlerError> {
        match self.values.get(name) {
            None | Some(Arg::Value(Value::Null)) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }

    /// Path of a file-path resource argument.
    pub fn path(&self, name: &str) -> Result<&Path, HandlerError> {
        match self.resource(name)? {
            Resource::Path(p) => Ok(p.as_path()),
            _ => Err(wrong_resource(name, "file-path")),
        }
    }

    /// The file-path resource itself.
    pub fn file(&self, name: &str) -> Result<&FilePath, HandlerError> {
        match self.resource(name)? {
            Resource::Path(p) => Ok(p),
            _ => Err(wrong_resource(name, "file-path")),
        }
    }

    /// Decoded audio argument.
    pub fn audio(&self, name: &str) -> Result<&AudioClip, HandlerError> {
        match self.resource(name)? {
            Resource::Audio(clip) => Ok(clip),
            _ => Err(wrong_resource(name, "audio")),
        }
    }

    /// Decoded image argument.
    pub fn image(&self, name: &str) -> Result<&ImageFrame, HandlerError> {
        match self.resource(name)? {
            Resource::Image(frame) => Ok(frame),
            _ => Err(wrong_resource(name, "image")),
        }
    }

    fn resource(&self, name: &str) -> Result<&Resource, HandlerError> {
        match self.values.get(name) {
            Some(Arg::Resource(r)) => Ok(r),
            Some(Arg::Value(_)) => Err(HandlerError::new(
                "ArgumentError",
                format!("argument '{name}' is a plain value, not a resource"),
            )),
            None => Err(missing(name)),
        }
    }
}

fn missing(name: &str) -> HandlerError {
    HandlerError::new("ArgumentError", format!("missing argument '{name}'"))
}

fn wrong_resource(name: &str, expected: &str) -> HandlerError {
    HandlerError::new(
        "ArgumentError",
        format!("argument '{name}' is not a {expected} resource"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_typed() {
        let args = Args::new().with_value("a", 2).with_value("tags", json!(["x", "y"]));

        assert_eq!(args.get::<f64>("a").unwrap(), 2.0);
        assert_eq!(args.get::<Vec<String>>("tags").unwrap(), vec!["x", "y"]);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_get_missing_and_mistyped() {
        let args = Args::new().with_value("a", "text");

        let err = args.get::<i64>("a").unwrap_err();
        assert_eq!(err.category(), "ArgumentError");
        assert!(err.message().contains("argument 'a'"));

        let err = args.get::<i64>("b").unwrap_err();
        assert!(err.message().contains("missing argument 'b'"));
    }

    #[test]
    fn test_get_opt() {
        let args = Args::new().with_value("n", Value::Null).with_value("m", 3);

        assert_eq!(args.get_opt::<i64>("n").unwrap(), None);
        assert_eq!(args.get_opt::<i64>("absent").unwrap(), None);
        assert_eq!(args.get_opt::<i64>("m").unwrap(), Some(3));
    }

    #[test]
    fn test_resource_accessors() {
        let mut args = Args::new().with_value("plain", 1);
        args.insert("file", Arg::Resource(Resource::Path(FilePath::new("/tmp/x"))));

        assert_eq!(args.path("file").unwrap(), Path::new("/tmp/x"));
        assert!(args.audio("file").is_err());
        assert!(args.path("plain").is_err());
        assert!(args.get::<String>("file").is_err());
    }
}
