//! Client lifecycle: one cancellation signal plus a tracker of background work

use std::future::Future;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;

/// Start/stop handle owned by a [`Client`](super::Client)
///
/// Background tasks are spawned through [`Lifecycle::spawn`] so that
/// [`Lifecycle::shutdown`] can wait for every one of them.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run `task` on the current runtime, tracked until it completes
    ///
    /// Fails without running `task` when called outside a Tokio runtime.
    pub fn spawn<F>(&self, task: F) -> Result<JoinHandle<F::Output>, TryCurrentError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = Handle::try_current()?;
        Ok(self.tracker.spawn_on(task, &handle))
    }

    /// Resolves once shutdown has begun
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of background tasks still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Signal cancellation, then wait for all tracked tasks
    ///
    /// Calling it again only waits again.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
