//! A single periodic-task abstraction standing in for
//! `scheduleAtFixedRate`/`cancel` -- used by the TTL sweeper, the heartbeat
//! sender, and the timeout sweeper.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A repeating background task with a cancelable handle.
///
/// Dropping the handle aborts the task, so an owner that forgets to call
/// `cancel()` explicitly still doesn't leak it past its own lifetime.
pub struct PeriodicTask {
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Waits `initial_delay`, then runs `action` every `period` until canceled.
    pub fn spawn<F, Fut>(initial_delay: Duration, period: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if !initial_delay.is_zero() {
                tokio::time::sleep(initial_delay).await;
            }
            loop {
                action().await;
                tokio::time::sleep(period).await;
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
