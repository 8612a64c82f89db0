//! # rpc-worker
//!
//! Worker-side SDK for exposing typed, introspectable RPC endpoints to a
//! host process.
//!
//! A worker declares a [`Service`]: user state, lifecycle hooks and a table
//! of [`Endpoint`]s. Each endpoint's parameter list, declared shapes and doc
//! comment are turned into a machine-readable schema once at construction.
//! A [`Dispatcher`] then runs calls: it validates and coerces the untyped
//! argument bag against that schema (loading audio and image parameters
//! from disk), invokes the handler, and always returns a [`CallOutcome`].
//!
//! ## Architecture
//!
//! - **schema**: shapes, doc parsing, schema derivation
//! - **validate**: coercion and resource materialization
//! - **handler**: endpoint builders and the method registry
//! - **dispatch**: the call pipeline and the cooperative scheduler
//! - **transport**: line JSON and framed MsgPack adapters over stdin/stdout
//!
//! ## Example
//!
//! ```ignore
//! use rpc_worker::{Endpoint, Service, ServiceState};
//!
//! struct Calculator;
//! impl ServiceState for Calculator {}
//!
//! #[tokio::main]
//! async fn main() -> rpc_worker::Result<()> {
//!     let service = Service::builder(Calculator)
//!         .version("1.0.0")
//!         .endpoint(
//!             Endpoint::immediate("add", |_: &Calculator, args| {
//!                 Ok(args.get::<f64>("a")? + args.get::<f64>("b")?)
//!             })
//!             .doc("Add two numbers.")
//!             .param::<f64>("a")
//!             .param::<f64>("b")
//!             .returns::<f64>(),
//!         )
//!         .build()?;
//!
//!     rpc_worker::worker::run_from_env(service).await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filestore;
pub mod handler;
pub mod logging;
pub mod manifest;
pub mod protocol;
pub mod schema;
pub mod service;
pub mod transport;
pub mod validate;
pub mod worker;

pub use config::WorkerConfig;
pub use dispatch::{CallOutcome, Dispatcher, ErrorKind, Failure, Outcome};
pub use error::{HandlerError, RegistryError, Result, WorkerError};
pub use filestore::{FileInfo, FileStore, FileStoreError};
pub use handler::{Endpoint, MethodRegistry};
pub use logging::ServiceLogger;
pub use manifest::Manifest;
pub use schema::{Describe, EndpointSchema, RecordShape, ServiceSchema, TypeShape};
pub use service::{HookKind, Service, ServiceBuilder, ServiceState};
pub use validate::{Args, AudioClip, FilePath, ImageFrame};
