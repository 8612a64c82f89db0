//! Call admission: which calls may run, and when teardown may start.
//!
//! A call takes a [`CallTicket`] before validation and holds it until its
//! handler returns. Closing the gate rejects new calls; teardown then waits
//! for the outstanding tickets to drop.

use std::pin::pin;
use std::sync::{Condvar, Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counts {
    closed: bool,
    in_flight: usize,
}

/// Open/closed flag plus an in-flight call counter.
#[derive(Debug, Default)]
pub(crate) struct Admission {
    counts: Mutex<Counts>,
    idle: Condvar,
    idle_async: Notify,
}

/// Held by an admitted call; dropping it releases the slot.
#[derive(Debug)]
pub(crate) struct CallTicket<'a> {
    admission: &'a Admission,
}

impl Admission {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Admit a call, or `None` once the gate is closed.
    pub(crate) fn enter(&self) -> Option<CallTicket<'_>> {
        let mut counts = self.lock();
        if counts.closed {
            return None;
        }
        counts.in_flight += 1;
        Some(CallTicket { admission: self })
    }

    /// Close the gate. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut counts = self.lock();
        !std::mem::replace(&mut counts.closed, true)
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.lock().closed
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Block until no admitted call is running.
    pub(crate) fn wait_idle(&self) {
        let mut counts = self.lock();
        while counts.in_flight > 0 {
            counts = self
                .idle
                .wait(counts)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Async variant of [`wait_idle`](Self::wait_idle).
    pub(crate) async fn wait_idle_async(&self) {
        loop {
            let mut notified = pin!(self.idle_async.notified());
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CallTicket<'_> {
    fn drop(&mut self) {
        let mut counts = self.admission.lock();
        counts.in_flight -= 1;
        if counts.in_flight == 0 {
            drop(counts);
            self.admission.idle.notify_all();
            self.admission.idle_async.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_closed_gate_rejects() {
        let admission = Admission::new();
        assert!(admission.enter().is_some());
        assert!(admission.close());
        assert!(!admission.close());
        assert!(admission.enter().is_none());
        assert!(!admission.is_open());
    }

    #[test]
    fn test_ticket_counts_in_flight() {
        let admission = Admission::new();
        let first = admission.enter().unwrap();
        let second = admission.enter().unwrap();
        assert_eq!(admission.in_flight(), 2);

        drop(first);
        drop(second);
        assert_eq!(admission.in_flight(), 0);
    }

    #[test]
    fn test_wait_idle_blocks_until_ticket_drops() {
        let admission = Arc::new(Admission::new());

        let worker = {
            let admission = Arc::clone(&admission);
            let (tx, rx) = std::sync::mpsc::channel();
            let handle = std::thread::spawn(move || {
                let _ticket = admission.enter().unwrap();
                tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
            });
            rx.recv().unwrap();
            handle
        };

        admission.close();
        admission.wait_idle();
        assert_eq!(admission.in_flight(), 0);
        worker.join().unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_async() {
        let admission = Arc::new(Admission::new());
        admission.wait_idle_async().await;

        let ticket_holder = {
            let admission = Arc::clone(&admission);
            let (tx, rx) = tokio::sync::oneshot::channel();
            let task = tokio::spawn(async move {
                let _ticket = admission.enter().unwrap();
                tx.send(()).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            });
            rx.await.unwrap();
            task
        };

        admission.close();
        admission.wait_idle_async().await;
        assert_eq!(admission.in_flight(), 0);
        ticket_holder.await.unwrap();
    }
}
