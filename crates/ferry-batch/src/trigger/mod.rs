//! Background triggers that start pipeline runs
//!
//! Each trigger runs as its own tokio task and is stopped through the
//! [`ListenerHandle`] returned when it is spawned.

pub mod sqs;
pub mod watcher;

pub use sqs::{QueueListener, QueueListenerSettings};
pub use watcher::DirectoryWatcher;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{BatchError, BatchResult};

/// Owns a running trigger task
pub struct ListenerHandle {
    name: &'static str,
    cancel: CancellationToken,
    task: JoinHandle<BatchResult<()>>,
    /// Task result, once [`ListenerHandle::exited`] has observed it
    outcome: Option<BatchResult<()>>,
}

impl ListenerHandle {
    pub(crate) fn new(
        name: &'static str,
        cancel: CancellationToken,
        task: JoinHandle<BatchResult<()>>,
    ) -> Self {
        Self {
            name,
            cancel,
            task,
            outcome: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.task.is_finished()
    }

    /// Token that stops the trigger when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the trigger and wait for it to exit
    ///
    /// A run already in progress finishes before the task exits.
    pub async fn shutdown(self) -> BatchResult<()> {
        info!(listener = self.name, "Stopping listener");
        self.cancel.cancel();
        self.wait().await
    }

    /// Resolves once the trigger task has exited, without stopping it
    ///
    /// Cancel-safe, so it can sit in a `select!` next to a shutdown signal.
    /// The result is kept for [`ListenerHandle::wait`].
    pub async fn exited(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let name = self.name;
        let joined = (&mut self.task).await;
        self.outcome = Some(joined.unwrap_or_else(|e| {
            Err(BatchError::Trigger(format!("{} task aborted: {}", name, e)))
        }));
    }

    /// Wait for the trigger to exit on its own
    pub async fn wait(mut self) -> BatchResult<()> {
        self.exited().await;
        self.outcome.take().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_exited_reports_failed_task_once() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(async { Err(BatchError::Queue("unknown queue".to_string())) });
        let mut handle = ListenerHandle::new("test", cancel, task);

        tokio::time::timeout(Duration::from_secs(2), handle.exited())
            .await
            .unwrap();
        assert!(handle.is_finished());

        // a second call must not poll the finished task again
        handle.exited().await;
        assert!(matches!(handle.shutdown().await, Err(BatchError::Queue(_))));
    }

    #[tokio::test]
    async fn test_exited_is_pending_while_running() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            token.cancelled().await;
            Ok(())
        });
        let mut handle = ListenerHandle::new("test", cancel, task);

        let early = tokio::time::timeout(Duration::from_millis(50), handle.exited()).await;
        assert!(early.is_err());
        assert!(!handle.is_finished());

        handle.shutdown().await.unwrap();
    }
}
