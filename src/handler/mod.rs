//! Handler module - endpoint registration.
//!
//! Provides:
//! - [`Endpoint`] - a handler function plus its declaration
//! - [`MethodRegistry`] - maps endpoint names to handlers and cached schemas
//!
//! # Example
//!
//! ```ignore
//! use rpc_worker::handler::{Endpoint, MethodRegistry};
//!
//! let mut registry = MethodRegistry::new();
//!
//! // Blocking handler
//! registry.register(
//!     Endpoint::immediate("add", |_: &Calc, args| Ok(args.get::<f64>("a")? + args.get::<f64>("b")?))
//!         .param::<f64>("a")
//!         .param::<f64>("b")
//!         .returns::<f64>(),
//! )?;
//!
//! // Async handler, driven on the shared scheduler
//! registry.register(
//!     Endpoint::suspending("fetch", |state: Arc<Calc>, args| async move { state.fetch(args).await })
//!         .param::<String>("url"),
//! )?;
//! ```

mod endpoint;
mod registry;

pub use endpoint::{BoxFuture, Endpoint, HandlerFn, HandlerResult};
pub use registry::MethodRegistry;
