//! Dispatch module - running a service.
//!
//! Provides:
//! - [`Dispatcher`] - validate, invoke and wrap calls; introspection; shutdown
//! - [`CallOutcome`] - the only value that crosses back to a transport
//! - [`Scheduler`] - the single cooperative loop for suspending handlers
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::start(service)?;
//!
//! let outcome = dispatcher.call("add", json!({"a": 2, "b": 3}));
//! assert_eq!(outcome.result(), Some(&json!(5.0)));
//!
//! dispatcher.shutdown();
//! ```

mod admission;
mod dispatcher;
mod outcome;
mod scheduler;

pub use dispatcher::Dispatcher;
pub use outcome::{CallOutcome, ErrorKind, Failure, Outcome};
pub use scheduler::Scheduler;
