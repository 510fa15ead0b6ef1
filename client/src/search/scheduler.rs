//! Event-loop abstraction used by the search coordinator
//!
//! Two suspension points exist: a cancellable delayed callback (the debounce timer)
//! and a detached request task. Both go through [`Scheduler`] so tests can drive time
//! by hand.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::runtime::Handle;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cancellation handle for a scheduled callback
///
/// Dropping the handle does not cancel the callback; call [`TimerHandle::cancel`].
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

pub trait Scheduler: Send + Sync {
    /// Run `callback` once after `delay`, unless cancelled first
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Run a detached task to completion
    fn spawn(&self, task: Task);
}

/// Scheduler backed by a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler for the runtime the caller is running on
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        // Deadline is fixed now, not when the task is first polled
        let deadline = tokio::time::Instant::now() + delay;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        });
        TimerHandle::new(move || task.abort())
    }

    fn spawn(&self, task: Task) {
        self.runtime.spawn(task);
    }
}
