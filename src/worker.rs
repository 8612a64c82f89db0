//! Worker process entry point.
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> rpc_worker::Result<()> {
//!     let service = Service::builder(Calculator).endpoint(add()).build()?;
//!     rpc_worker::worker::run_from_env(service).await
//! }
//! ```

use tokio::io::{stdin, stdout, BufReader};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::logging;
use crate::service::{Service, ServiceState};
use crate::transport::{serve_framed, serve_line, TransportKind};

/// Run `service` on stdin/stdout until the host closes the input or asks for
/// shutdown.
///
/// Installs the stderr log subscriber, runs setup, serves the configured
/// transport, then runs teardown if no shutdown request already did.
pub async fn run<S: ServiceState>(service: Service<S>, config: &WorkerConfig) -> Result<()> {
    if let Err(e) = logging::init(&config.log_config()) {
        debug!(error = %e, "Keeping existing tracing subscriber");
    }

    let dispatcher = Dispatcher::start_async(service).await?;
    info!(
        service = dispatcher.name(),
        transport = ?config.transport,
        "Worker ready"
    );

    let served = match config.transport {
        TransportKind::Line => serve_line(&dispatcher, BufReader::new(stdin()), stdout()).await,
        TransportKind::Framed => serve_framed(dispatcher.clone(), stdin(), stdout()).await,
    };

    if dispatcher.is_running() {
        let outcome = dispatcher.shutdown_async().await;
        if let Some(failure) = outcome.failure_details() {
            warn!(kind = %failure.kind, message = %failure.message, "Teardown failed");
        }
    }

    info!(service = dispatcher.name(), "Worker exiting");
    served
}

/// [`run`] with configuration read from the environment.
pub async fn run_from_env<S: ServiceState>(service: Service<S>) -> Result<()> {
    let config = WorkerConfig::from_env()?;
    run(service, &config).await
}
