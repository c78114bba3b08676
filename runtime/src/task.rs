//! Background loops with cooperative shutdown.

use crate::signal::Stopper;
use futures::{channel::oneshot, future::Shared};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A background loop that repeatedly runs a step until stopped.
///
/// The step is a synchronous closure returning whether more work is
/// immediately pending. When it is, the loop yields and runs the step again;
/// otherwise it sleeps for `interval`. A stop request is observed between
/// steps, so the loop always finishes the step it is running. Dropping a
/// [Task] without stopping it cancels the loop.
pub struct Task {
    label: String,
    stopper: Stopper,
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Spawn a loop on the current [tokio] runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a [tokio] runtime.
    pub fn spawn<F>(label: impl Into<String>, interval: Duration, mut step: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let label = label.into();
        let stopper = Stopper::new();
        let mut signal = stopper
            .signal()
            .expect("a fresh stopper is always running");
        let handle = tokio::spawn({
            let label = label.clone();
            async move {
                info!(task = %label, "started");
                loop {
                    let pending = step();
                    tokio::select! {
                        biased;
                        _ = &mut signal => break,
                        _ = idle(pending, interval) => {},
                    }
                }
                info!(task = %label, "stopped");
            }
        });

        Self {
            label,
            stopper,
            handle: Some(handle),
        }
    }

    /// The label the task was spawned with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopper.is_stopped()
    }

    /// Request stop without waiting.
    ///
    /// The returned future resolves once the loop has exited. Every call
    /// returns the same completion, so concurrent owners can all wait on it.
    pub fn request_stop(&mut self) -> Shared<oneshot::Receiver<()>> {
        self.stopper.stop()
    }

    /// Request stop and wait for the loop to exit.
    ///
    /// Calling this more than once is allowed.
    pub async fn stop(&mut self) {
        let completion = self.request_stop();
        let _ = completion.await;
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(task = %self.label, ?err, "task failed");
            }
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // A loop whose owner is gone must not keep polling.
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait before the next step.
async fn idle(pending: bool, interval: Duration) {
    if pending {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}
