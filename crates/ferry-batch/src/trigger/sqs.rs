//! Starts a run for every object announced on the notification queue

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::ListenerHandle;
use crate::error::BatchResult;
use crate::job::JobParameters;
use crate::pipeline::JobLauncher;
use crate::queue::{parse_notification, QueueMessage, QueueService};

#[derive(Debug, Clone)]
pub struct QueueListenerSettings {
    pub queue_name: String,
    pub max_messages: i32,
    pub wait_time_secs: i32,
    /// Pause after a failed receive before polling again
    pub error_backoff: Duration,
}

impl QueueListenerSettings {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_messages: 1,
            wait_time_secs: 20,
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Long-polls a queue of bucket notifications
///
/// Every received message is deleted once its run has been attempted,
/// whatever the outcome, so a bad file is not redelivered forever.
pub struct QueueListener {
    queue: Arc<dyn QueueService>,
    launcher: Arc<JobLauncher>,
    settings: QueueListenerSettings,
}

impl QueueListener {
    pub fn new(
        queue: Arc<dyn QueueService>,
        launcher: Arc<JobLauncher>,
        settings: QueueListenerSettings,
    ) -> Self {
        Self {
            queue,
            launcher,
            settings,
        }
    }

    pub fn spawn(self) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        ListenerHandle::new("queue-listener", cancel, task)
    }

    async fn run(self, cancel: CancellationToken) -> BatchResult<()> {
        let resolved = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            url = self.queue.resolve_queue_url(&self.settings.queue_name) => url,
        };
        let queue_url = match resolved {
            Ok(url) => url,
            Err(e) => {
                error!(queue = %self.settings.queue_name, error = %e, "Cannot resolve queue");
                return Err(e);
            },
        };

        info!(queue = %self.settings.queue_name, url = %queue_url, "Listening for notifications");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.queue.receive(
                    &queue_url,
                    self.settings.max_messages,
                    self.settings.wait_time_secs,
                ) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "Receive failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.error_backoff) => continue,
                    }
                },
            };

            for message in messages {
                self.process_message(&message).await;
                if let Err(e) = self.queue.delete(&queue_url, &message.receipt_handle).await {
                    error!(message_id = ?message.message_id, error = %e, "Failed to delete message");
                }
            }
        }

        info!(queue = %self.settings.queue_name, "Queue listener stopped");
        Ok(())
    }

    #[instrument(skip_all, fields(message_id = ?message.message_id))]
    async fn process_message(&self, message: &QueueMessage) {
        let locations = match parse_notification(&message.body) {
            Ok(locations) => locations,
            Err(e) => {
                error!(error = %e, body = %message.body, "Error processing message");
                return;
            },
        };

        for location in locations {
            info!(bucket = %location.bucket, key = %location.key, "Object announced");
            let parameters = JobParameters::for_object(&location.bucket, &location.key);

            match self.launcher.run(parameters).await {
                Ok(execution) => debug!(
                    execution_id = execution.id(),
                    status = %execution.status(),
                    "Run finished"
                ),
                Err(e) => error!(
                    bucket = %location.bucket,
                    key = %location.key,
                    error = %e,
                    "Error processing object"
                ),
            }
        }
    }
}
