//! Method registry for dispatching calls by endpoint name.
//!
//! The registry maps names to endpoints and caches each endpoint's derived
//! schema at registration. Listing order is declaration order.
//!
//! # Example
//!
//! ```ignore
//! use rpc_worker::handler::{Endpoint, MethodRegistry};
//!
//! let mut registry = MethodRegistry::new();
//! registry.register(Endpoint::immediate("add", add).param::<f64>("a").param::<f64>("b"))?;
//!
//! assert_eq!(registry.list_endpoints(), ["add"]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::Endpoint;
use crate::error::RegistryError;
use crate::schema::{derive, EndpointSchema};

/// Entry for a registered endpoint.
struct MethodEntry<S> {
    endpoint: Endpoint<S>,
    /// Derived once, read-only afterwards.
    schema: Arc<EndpointSchema>,
}

/// Registry mapping endpoint names to handlers.
pub struct MethodRegistry<S> {
    /// Endpoints in declaration order.
    entries: Vec<MethodEntry<S>>,
    /// Name to position in `entries`.
    index: HashMap<String, usize>,
}

impl<S> MethodRegistry<S> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register an endpoint and derive its schema.
    ///
    /// Fails with [`RegistryError::DuplicateEndpoint`] if the name is taken.
    pub fn register(&mut self, endpoint: Endpoint<S>) -> Result<(), RegistryError> {
        let name = endpoint.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateEndpoint(name));
        }

        let schema = Arc::new(derive(endpoint.decl()));
        self.index.insert(name, self.entries.len());
        self.entries.push(MethodEntry { endpoint, schema });
        Ok(())
    }

    /// Whether `name` is a registered endpoint.
    pub fn is_endpoint(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Endpoint names in declaration order.
    pub fn list_endpoints(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.endpoint.name()).collect()
    }

    /// Get an endpoint by name.
    pub fn get(&self, name: &str) -> Option<&Endpoint<S>> {
        self.index.get(name).map(|&i| &self.entries[i].endpoint)
    }

    /// Cached schema of an endpoint.
    pub fn schema(&self, name: &str) -> Option<&Arc<EndpointSchema>> {
        self.index.get(name).map(|&i| &self.entries[i].schema)
    }

    /// All cached schemas in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = &EndpointSchema> {
        self.entries.iter().map(|e| e.schema.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> Default for MethodRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for MethodRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("endpoints", &self.list_endpoints())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::validate::Args;

    struct Svc;

    fn noop(_: &Svc, _: Args) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn test_register_method() {
        let mut registry = MethodRegistry::new();
        registry.register(Endpoint::immediate("echo", noop)).unwrap();

        assert!(registry.is_endpoint("echo"));
        assert!(registry.get("echo").is_some());
        assert_eq!(registry.schema("echo").unwrap().name, "echo");
    }

    #[test]
    fn test_declaration_order() {
        let mut registry = MethodRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Endpoint::immediate(name, noop)).unwrap();
        }

        assert_eq!(registry.list_endpoints(), ["zeta", "alpha", "mid"]);
        let names: Vec<_> = registry.schemas().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = MethodRegistry::new();
        registry.register(Endpoint::immediate("add", noop)).unwrap();

        let err = registry.register(Endpoint::immediate("add", noop)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEndpoint("add".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handler_not_found() {
        let registry = MethodRegistry::<Svc>::new();

        assert!(registry.get("nonexistent").is_none());
        assert!(!registry.is_endpoint("nonexistent"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_schema_cached() {
        let mut registry = MethodRegistry::new();
        registry
            .register(Endpoint::immediate("sum", noop).param::<Vec<f64>>("values"))
            .unwrap();

        let first = Arc::clone(registry.schema("sum").unwrap());
        let second = Arc::clone(registry.schema("sum").unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.input.required, vec!["values".to_string()]);
    }
}
