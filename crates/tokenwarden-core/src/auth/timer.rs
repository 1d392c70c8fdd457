use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A single deferred renewal.
///
/// Cancelling aborts the task and is idempotent. Dropping the handle cancels
/// too, so a timer can never outlive the session state that owns it.
pub(crate) struct RenewalTimer {
    id: u64,
    delay: Duration,
    deadline: Instant,
    handle: Option<JoinHandle<()>>,
}

impl RenewalTimer {
    /// Spawn `action` to run after `delay`. Must be called inside a tokio runtime.
    pub(crate) fn arm<F>(id: u64, delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        Self {
            id,
            delay,
            deadline: Instant::now() + delay,
            handle: Some(handle),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Release the handle without aborting. Used by the timer's own task once
    /// it has fired, so re-arming does not abort the renewal in progress.
    pub(crate) fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
