//! Service definition: user state, lifecycle hooks and the endpoint table.
//!
//! # Example
//!
//! ```ignore
//! struct Calculator;
//!
//! impl ServiceState for Calculator {}
//!
//! let service = Service::builder(Calculator)
//!     .version("1.0.0")
//!     .description("Basic arithmetic")
//!     .endpoint(Endpoint::immediate("add", add).param::<f64>("a").param::<f64>("b"))
//!     .build()?;
//! ```

use crate::error::{short_type_name, HandlerError, RegistryError};
use crate::handler::{BoxFuture, Endpoint, MethodRegistry};
use crate::logging::ServiceLogger;
use crate::schema::ServiceSchema;
use crate::validate::Materializer;

/// Which variant of a lifecycle hook a service implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookKind {
    /// The blocking hook (`setup` / `teardown`).
    #[default]
    Immediate,
    /// The async hook (`setup_async` / `teardown_async`), run on the scheduler.
    Suspending,
}

/// User state behind a service, with its lifecycle hooks.
///
/// Each hook has a blocking and an async variant; the associated consts pick
/// which one runs. Both default to no-ops.
pub trait ServiceState: Send + Sync + Sized + 'static {
    /// Variant of the setup hook to run.
    const SETUP: HookKind = HookKind::Immediate;
    /// Variant of the teardown hook to run.
    const TEARDOWN: HookKind = HookKind::Immediate;

    /// Called once before the first call is dispatched.
    fn setup(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn setup_async(&mut self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async { Ok(()) })
    }

    /// Called once at shutdown.
    fn teardown(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn teardown_async(&self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async { Ok(()) })
    }
}

impl ServiceState for () {}

/// A fully built service: state plus its immutable endpoint table.
pub struct Service<S> {
    pub(crate) state: S,
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) description: String,
    pub(crate) registry: MethodRegistry<S>,
    pub(crate) materializer: Materializer,
    pub(crate) logger: ServiceLogger,
}

impl<S> Service<S> {
    /// Start defining a service around `state`.
    pub fn builder(state: S) -> ServiceBuilder<S> {
        ServiceBuilder::new(state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn registry(&self) -> &MethodRegistry<S> {
        &self.registry
    }

    pub fn logger(&self) -> &ServiceLogger {
        &self.logger
    }

    /// Endpoint names in declaration order.
    pub fn list_methods(&self) -> Vec<String> {
        self.registry
            .list_endpoints()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whole-service schema document.
    pub fn schema(&self) -> ServiceSchema {
        ServiceSchema {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            methods: self.registry.schemas().cloned().collect(),
        }
    }
}

impl<S> std::fmt::Debug for Service<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Service`].
pub struct ServiceBuilder<S> {
    state: S,
    name: Option<String>,
    version: String,
    description: String,
    endpoints: Vec<Endpoint<S>>,
    materializer: Option<Materializer>,
}

impl<S> ServiceBuilder<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            name: None,
            version: "0.0.0".to_string(),
            description: String::new(),
            endpoints: Vec::new(),
            materializer: None,
        }
    }

    /// Service name. Defaults to the state type's name, lowercased.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Add an endpoint. Declaration order is listing order.
    pub fn endpoint(mut self, endpoint: Endpoint<S>) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Replace the default resource materializer.
    pub fn materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Build the endpoint table. Fails on duplicate endpoint names.
    pub fn build(self) -> Result<Service<S>, RegistryError> {
        let mut registry = MethodRegistry::new();
        for endpoint in self.endpoints {
            registry.register(endpoint)?;
        }

        let name = self
            .name
            .unwrap_or_else(|| short_type_name::<S>().to_lowercase());
        let logger = ServiceLogger::new(&name);

        Ok(Service {
            state: self.state,
            name,
            version: self.version,
            description: self.description,
            registry,
            materializer: self.materializer.unwrap_or_default(),
            logger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Args;

    struct Calculator;

    impl ServiceState for Calculator {}

    fn add(_: &Calculator, args: Args) -> Result<f64, HandlerError> {
        Ok(args.get::<f64>("a")? + args.get::<f64>("b")?)
    }

    #[test]
    fn test_defaults() {
        let service = Service::builder(Calculator).build().unwrap();

        assert_eq!(service.name(), "calculator");
        assert_eq!(service.version(), "0.0.0");
        assert_eq!(service.logger().name(), "calculator");
        assert!(service.list_methods().is_empty());
    }

    #[test]
    fn test_explicit_metadata() {
        let service = Service::builder(Calculator)
            .name("calc")
            .version("1.2.3")
            .description("Arithmetic")
            .endpoint(Endpoint::immediate("add", add).param::<f64>("a").param::<f64>("b"))
            .build()
            .unwrap();

        let schema = service.schema();
        assert_eq!(schema.name, "calc");
        assert_eq!(schema.version, "1.2.3");
        assert_eq!(schema.description, "Arithmetic");
        assert_eq!(service.list_methods(), ["add"]);
    }

    #[test]
    fn test_duplicate_endpoint_is_fatal() {
        let err = Service::builder(Calculator)
            .endpoint(Endpoint::immediate("add", add))
            .endpoint(Endpoint::immediate("add", add))
            .build()
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateEndpoint("add".into()));
    }

    #[test]
    fn test_unit_state_hooks_are_noops() {
        let mut state = ();
        assert!(state.setup().is_ok());
        assert!(state.teardown().is_ok());
        assert_eq!(<() as ServiceState>::SETUP, HookKind::Immediate);
    }
}
