//! Delayed expiry tasks
//!
//! Each scheduled action runs at most once. Whoever flips the handle's
//! `fired` flag first owns the outcome: the timer runs the action, or the
//! canceller prevents it and aborts the sleeping timer task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};

use crate::observability::{log_event_with_fields, Event};

/// Cancellable handle to one scheduled action
#[derive(Debug, Clone)]
pub struct ExpiryHandle {
    fired: Arc<AtomicBool>,
    task: Arc<OnceLock<AbortHandle>>,
}

impl ExpiryHandle {
    fn new() -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            task: Arc::new(OnceLock::new()),
        }
    }

    /// Claim the action for the caller
    ///
    /// True if the action had not run and now never will; the timer task
    /// is aborted. False if the timer (or an earlier cancel) got there
    /// first.
    pub fn cancel(&self) -> bool {
        if !self.claim() {
            return false;
        }
        if let Some(task) = self.task.get() {
            task.abort();
        }
        true
    }

    /// True once the action has been claimed by either side
    pub fn is_claimed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Runs expiry actions on a tokio runtime after a delay
pub struct ExpiryScheduler {
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl ExpiryScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Scheduler on the runtime of the calling task
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Run `action` on the blocking pool after `delay` unless cancelled
    ///
    /// After shutdown the returned handle never fires.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> ExpiryHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = ExpiryHandle::new();
        if self.shut_down.load(Ordering::Acquire) {
            return handle;
        }

        let timer = handle.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if timer.claim() {
                let _ = tokio::task::spawn_blocking(action).await;
            }
        });
        let _ = handle.task.set(task.abort_handle());

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
        handle
    }

    /// Timers not yet finished
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort every pending timer; later schedules are ignored
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let aborted = match self.tasks.lock() {
            Ok(mut tasks) => {
                let count = tasks.len();
                for task in tasks.drain(..) {
                    task.abort();
                }
                count
            }
            Err(_) => 0,
        };
        let aborted = aborted.to_string();
        log_event_with_fields(Event::SchedulerShutdown, &[("aborted", aborted.as_str())]);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
