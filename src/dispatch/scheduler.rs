//! Single cooperative scheduler for suspending handlers.
//!
//! One dedicated thread drives a current-thread tokio runtime. Every task
//! submitted here holds the gate for its whole body, so two suspending
//! handler bodies never overlap, while callers on other threads (or other
//! runtimes) wait for their own result only.

use std::future::Future;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{panic_message, SchedulerError};

/// Handle to the scheduler thread.
pub struct Scheduler {
    handle: Handle,
    gate: Arc<tokio::sync::Mutex<()>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Scheduler {
    /// Spawn the scheduler thread.
    pub fn start() -> Result<Self, SchedulerError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SchedulerError::Start)?;
        let handle = runtime.handle().clone();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("rpc-worker-scheduler".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                debug!("Scheduler loop exited");
            })
            .map_err(SchedulerError::Start)?;

        Ok(Self {
            handle,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            thread_id: thread.thread().id(),
            stop: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Whether the current thread is the scheduler thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Spawn `fut` behind the gate and hand its result to `deliver`.
    fn submit<F, T>(&self, fut: F, deliver: impl FnOnce(Result<T, SchedulerError>) + Send + 'static)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        self.handle.spawn(async move {
            let _guard = gate.lock().await;
            // The inner task isolates panics in the body from the gate holder.
            let result = tokio::spawn(fut).await.map_err(|e| {
                if e.is_panic() {
                    SchedulerError::Panicked(panic_message(e.into_panic().as_ref()))
                } else {
                    SchedulerError::Closed
                }
            });
            deliver(result);
        });
    }

    /// Run `fut` on the scheduler and block the calling thread until it completes.
    pub fn block_on<F, T>(&self, fut: F) -> Result<T, SchedulerError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Err(SchedulerError::Reentrant);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(fut, move |result| {
            let _ = tx.send(result);
        });
        rx.recv().map_err(|_| SchedulerError::Closed)?
    }

    /// Run `fut` on the scheduler and await its result from another runtime.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, SchedulerError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(fut, move |result| {
            let _ = tx.send(result);
        });
        rx.await.map_err(|_| SchedulerError::Closed)?
    }

    /// Stop the loop and join the thread. Pending tasks are dropped.
    pub fn shutdown(&self) {
        if let Some(stop) = lock(&self.stop).take() {
            let _ = stop.send(());
        }

        let thread = lock(&self.thread).take();
        if let Some(thread) = thread {
            if self.is_current() {
                return;
            }
            if thread.join().is_err() {
                warn!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
