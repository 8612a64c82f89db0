//! The dispatch core: validate, coerce, invoke, wrap.
//!
//! Every call returns a [`CallOutcome`]. Nothing a handler does (returning an
//! error or panicking) escapes past this boundary.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::admission::{Admission, CallTicket};
use super::outcome::{CallOutcome, ErrorKind, Failure};
use super::scheduler::Scheduler;
use crate::error::{HandlerError, Result, SchedulerError, WorkerError};
use crate::handler::{Endpoint, HandlerFn, HandlerResult, MethodRegistry};
use crate::logging::ServiceLogger;
use crate::schema::{value_kind, EndpointSchema, ServiceSchema};
use crate::service::{HookKind, Service, ServiceState};
use crate::validate::{validate_and_coerce, ArgumentError, Args, Materializer};

struct Shared<S: ServiceState> {
    state: Arc<S>,
    registry: MethodRegistry<S>,
    materializer: Materializer,
    logger: ServiceLogger,
    schema: ServiceSchema,
    /// Closed once shutdown begins; teardown waits for admitted calls.
    admission: Admission,
    scheduler: Scheduler,
}

/// A started service. Cheap to clone; clones share one service instance.
pub struct Dispatcher<S: ServiceState> {
    shared: Arc<Shared<S>>,
}

impl<S: ServiceState> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Parts<S> {
    registry: MethodRegistry<S>,
    materializer: Materializer,
    logger: ServiceLogger,
    schema: ServiceSchema,
}

fn split<S>(service: Service<S>) -> (S, Parts<S>) {
    let schema = service.schema();
    let Service {
        state,
        registry,
        materializer,
        logger,
        ..
    } = service;
    (
        state,
        Parts {
            registry,
            materializer,
            logger,
            schema,
        },
    )
}

impl<S: ServiceState> Dispatcher<S> {
    /// Start the scheduler and run the setup hook once.
    ///
    /// A suspending setup hook runs on the scheduler while the calling thread
    /// blocks. From async code prefer [`start_async`](Self::start_async).
    pub fn start(service: Service<S>) -> Result<Self> {
        let scheduler = Scheduler::start()?;
        let (mut state, parts) = split(service);

        match S::SETUP {
            HookKind::Immediate => state.setup().map_err(WorkerError::Setup)?,
            HookKind::Suspending => {
                let (returned, result) = scheduler.block_on(async move {
                    let result = state.setup_async().await;
                    (state, result)
                })?;
                result.map_err(WorkerError::Setup)?;
                state = returned;
            }
        }

        Ok(Self::assemble(state, parts, scheduler))
    }

    /// Async variant of [`start`](Self::start).
    pub async fn start_async(service: Service<S>) -> Result<Self> {
        let scheduler = Scheduler::start()?;
        let (mut state, parts) = split(service);

        match S::SETUP {
            HookKind::Immediate => state.setup().map_err(WorkerError::Setup)?,
            HookKind::Suspending => {
                let (returned, result) = scheduler
                    .run(async move {
                        let result = state.setup_async().await;
                        (state, result)
                    })
                    .await?;
                result.map_err(WorkerError::Setup)?;
                state = returned;
            }
        }

        Ok(Self::assemble(state, parts, scheduler))
    }

    fn assemble(state: S, parts: Parts<S>, scheduler: Scheduler) -> Self {
        info!(
            service = %parts.schema.name,
            version = %parts.schema.version,
            methods = parts.registry.len(),
            "Service started"
        );
        Self {
            shared: Arc::new(Shared {
                state: Arc::new(state),
                registry: parts.registry,
                materializer: parts.materializer,
                logger: parts.logger,
                schema: parts.schema,
                admission: Admission::new(),
                scheduler,
            }),
        }
    }

    /// Dispatch a call, blocking the current thread until it completes.
    ///
    /// Immediate handlers run inline; suspending handlers are bridged onto
    /// the shared scheduler.
    pub fn call(&self, method: &str, params: Value) -> CallOutcome {
        let (endpoint, args, _ticket) = match self.prepare(method, params) {
            Ok(prepared) => prepared,
            Err(outcome) => return self.finish(method, outcome),
        };

        let outcome = match endpoint.handler() {
            HandlerFn::Immediate(f) => self.invoke_immediate(|| f(self.state(), args)),
            HandlerFn::Suspending(f) => {
                let fut = f(Arc::clone(&self.shared.state), args);
                settle(self.shared.scheduler.block_on(fut))
            }
        };
        self.finish(method, outcome)
    }

    /// Dispatch a call from async code.
    pub async fn call_async(&self, method: &str, params: Value) -> CallOutcome {
        let (endpoint, args, _ticket) = match self.prepare(method, params) {
            Ok(prepared) => prepared,
            Err(outcome) => return self.finish(method, outcome),
        };

        let outcome = match endpoint.handler() {
            HandlerFn::Immediate(f) => self.invoke_immediate(|| f(self.state(), args)),
            HandlerFn::Suspending(f) => {
                let fut = f(Arc::clone(&self.shared.state), args);
                settle(self.shared.scheduler.run(fut).await)
            }
        };
        self.finish(method, outcome)
    }

    /// Received -> Validating. Any failure here is already an outcome.
    ///
    /// The returned ticket must be held until the handler returns.
    fn prepare(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<(&Endpoint<S>, Args, CallTicket<'_>), CallOutcome> {
        let Some(ticket) = self.shared.admission.enter() else {
            return Err(CallOutcome::error(
                ErrorKind::ServiceStopped,
                "Service has been shut down",
            ));
        };

        let registry = &self.shared.registry;
        let (endpoint, schema) = match (registry.get(method), registry.schema(method)) {
            (Some(endpoint), Some(schema)) => (endpoint, schema),
            _ => {
                return Err(CallOutcome::error(
                    ErrorKind::UnknownMethod,
                    format!("Unknown method: {method}"),
                ))
            }
        };

        let raw = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(CallOutcome::error(
                    ErrorKind::ValidationError,
                    format!("params must be an object, got {}", value_kind(&other)),
                ))
            }
        };

        let mut args = validate_and_coerce(schema, &raw, &self.shared.materializer)
            .map_err(argument_failure)?;
        args.set_logger(self.shared.logger.clone());
        Ok((endpoint, args, ticket))
    }

    fn invoke_immediate(&self, f: impl FnOnce() -> HandlerResult) -> CallOutcome {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result.into(),
            Err(payload) => CallOutcome::failure(HandlerError::from_panic(payload.as_ref()).into()),
        }
    }

    fn finish(&self, method: &str, outcome: CallOutcome) -> CallOutcome {
        match outcome.failure_details() {
            None => debug!(method, "Call succeeded"),
            Some(f) => warn!(method, kind = %f.kind, message = %f.message, "Call failed"),
        }
        outcome
    }

    /// Endpoint names in declaration order.
    pub fn list_methods(&self) -> Vec<String> {
        self.shared
            .registry
            .list_endpoints()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whole-service schema document.
    pub fn get_schema(&self) -> &ServiceSchema {
        &self.shared.schema
    }

    /// Schema of one endpoint.
    pub fn get_method_schema(&self, name: &str) -> Option<Arc<EndpointSchema>> {
        self.shared.registry.schema(name).cloned()
    }

    /// Stop accepting calls, wait for running ones, then run the teardown
    /// hook once.
    ///
    /// A second shutdown returns a `ServiceStopped` failure.
    pub fn shutdown(&self) -> CallOutcome {
        if !self.shared.admission.close() {
            return CallOutcome::error(ErrorKind::ServiceStopped, "Service already stopped");
        }
        info!(service = %self.shared.schema.name, "Shutting down service");
        self.shared.admission.wait_idle();
        self.shared.teardown_blocking()
    }

    /// Async variant of [`shutdown`](Self::shutdown).
    pub async fn shutdown_async(&self) -> CallOutcome {
        if !self.shared.admission.close() {
            return CallOutcome::error(ErrorKind::ServiceStopped, "Service already stopped");
        }
        info!(service = %self.shared.schema.name, "Shutting down service");
        self.shared.admission.wait_idle_async().await;

        match S::TEARDOWN {
            HookKind::Immediate => self.shared.teardown_immediate(),
            HookKind::Suspending => {
                let state = Arc::clone(&self.shared.state);
                let result = self
                    .shared
                    .scheduler
                    .run(async move { state.teardown_async().await })
                    .await;
                settle(result.map(|r| r.map(|()| Value::Null)))
            }
        }
    }

    /// Whether calls are still accepted.
    pub fn is_running(&self) -> bool {
        self.shared.admission.is_open()
    }

    pub fn name(&self) -> &str {
        &self.shared.schema.name
    }

    pub fn logger(&self) -> &ServiceLogger {
        &self.shared.logger
    }

    pub fn state(&self) -> &S {
        &self.shared.state
    }
}

impl<S: ServiceState> Shared<S> {
    fn teardown_immediate(&self) -> CallOutcome {
        match catch_unwind(AssertUnwindSafe(|| self.state.teardown())) {
            Ok(result) => result.map(|()| Value::Null).into(),
            Err(payload) => CallOutcome::failure(HandlerError::from_panic(payload.as_ref()).into()),
        }
    }

    fn teardown_blocking(&self) -> CallOutcome {
        match S::TEARDOWN {
            HookKind::Immediate => self.teardown_immediate(),
            HookKind::Suspending => {
                let state = Arc::clone(&self.state);
                let result = self
                    .scheduler
                    .block_on(async move { state.teardown_async().await });
                settle(result.map(|r| r.map(|()| Value::Null)))
            }
        }
    }
}

impl<S: ServiceState> Drop for Shared<S> {
    fn drop(&mut self) {
        if !self.admission.close() {
            return;
        }
        debug!(service = %self.schema.name, "Dispatcher dropped while running, tearing down");
        let outcome = self.teardown_blocking();
        if let Some(f) = outcome.failure_details() {
            warn!(service = %self.schema.name, message = %f.message, "Teardown failed");
        }
    }
}

impl<S: ServiceState> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.shared.schema.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn argument_failure(err: ArgumentError) -> CallOutcome {
    let kind = match err {
        ArgumentError::Resource { .. } => ErrorKind::ResourceMaterializationError,
        ArgumentError::Missing { .. } | ArgumentError::Validation { .. } => {
            ErrorKind::ValidationError
        }
    };
    CallOutcome::error(kind, err.to_string())
}

fn settle(result: std::result::Result<HandlerResult, SchedulerError>) -> CallOutcome {
    match result {
        Ok(result) => result.into(),
        Err(SchedulerError::Panicked(message)) => {
            CallOutcome::failure(HandlerError::new("panic", message).into())
        }
        Err(SchedulerError::Closed) => {
            CallOutcome::error(ErrorKind::ServiceStopped, "Scheduler is closed")
        }
        Err(err) => CallOutcome::failure(Failure {
            category: Some("SchedulerError".to_string()),
            ..Failure::new(ErrorKind::HandlerError, err.to_string())
        }),
    }
}
