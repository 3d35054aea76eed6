//! Message queue access for bucket notifications

use async_trait::async_trait;
use aws_sdk_sqs::{error::DisplayErrorContext, Client};
use tracing::{debug, info, instrument};

use crate::error::{BatchError, BatchResult};
use crate::storage::AwsSettings;

pub mod memory;
pub mod notification;

pub use memory::InMemoryQueue;
pub use notification::{parse_notification, ObjectLocation, S3EventNotification};

/// A received message; `receipt_handle` is needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait QueueService: Send + Sync {
    async fn resolve_queue_url(&self, queue_name: &str) -> BatchResult<String>;

    /// Long-poll for up to `max_messages`, waiting at most `wait_time_secs`
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> BatchResult<Vec<QueueMessage>>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> BatchResult<()>;
}

#[derive(Clone)]
pub struct SqsQueueService {
    client: Client,
}

impl SqsQueueService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_settings(settings: &AwsSettings) -> Self {
        let sdk_config = settings.load().await;
        info!(region = %settings.region, endpoint = ?settings.endpoint, "SQS client initialized");
        Self::new(Client::new(&sdk_config))
    }
}

fn queue_error(operation: &str, err: impl std::error::Error) -> BatchError {
    BatchError::Queue(format!("{} failed: {}", operation, DisplayErrorContext(&err)))
}

#[async_trait]
impl QueueService for SqsQueueService {
    #[instrument(skip(self))]
    async fn resolve_queue_url(&self, queue_name: &str) -> BatchResult<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| queue_error("GetQueueUrl", e))?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| BatchError::Queue(format!("no URL returned for queue {}", queue_name)))
    }

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> BatchResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .send()
            .await
            .map_err(|e| queue_error("ReceiveMessage", e))?;

        let messages: Vec<QueueMessage> = output
            .messages()
            .iter()
            .filter_map(|m| {
                Some(QueueMessage {
                    message_id: m.message_id().map(str::to_string),
                    body: m.body().unwrap_or_default().to_string(),
                    receipt_handle: m.receipt_handle()?.to_string(),
                })
            })
            .collect();

        if !messages.is_empty() {
            debug!(count = messages.len(), "Received messages");
        }
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> BatchResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| queue_error("DeleteMessage", e))?;

        debug!("Deleted message");
        Ok(())
    }
}
