//! In-memory queue service for tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout_at, Duration, Instant};
use uuid::Uuid;

use super::{QueueMessage, QueueService};
use crate::error::{BatchError, BatchResult};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(String, String)>,
    in_flight: HashMap<String, QueueMessage>,
    deleted: Vec<QueueMessage>,
}

/// Single named queue kept in process memory
///
/// Received messages stay in flight until deleted; there is no visibility
/// timeout, so an undeleted message is never redelivered.
pub struct InMemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    available: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
        }
    }

    pub fn url(&self) -> String {
        format!("memory://{}", self.name)
    }

    /// Enqueue `body`, returning its message id
    pub async fn send(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .await
            .pending
            .push_back((id.clone(), body.into()));
        self.available.notify_waiters();
        id
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Messages deleted so far, in deletion order
    pub async fn deleted(&self) -> Vec<QueueMessage> {
        self.state.lock().await.deleted.clone()
    }

    fn check_url(&self, queue_url: &str) -> BatchResult<()> {
        if queue_url == self.url() {
            Ok(())
        } else {
            Err(BatchError::Queue(format!("unknown queue URL {}", queue_url)))
        }
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn resolve_queue_url(&self, queue_name: &str) -> BatchResult<String> {
        if queue_name == self.name {
            Ok(self.url())
        } else {
            Err(BatchError::Queue(format!("queue {} does not exist", queue_name)))
        }
    }

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_time_secs: i32,
    ) -> BatchResult<Vec<QueueMessage>> {
        self.check_url(queue_url)?;
        let max = usize::try_from(max_messages.max(1)).unwrap_or(1);
        let deadline = Instant::now() + Duration::from_secs(wait_time_secs.max(0) as u64);

        loop {
            // registered before the check so a concurrent send is not missed
            let notified = self.available.notified();
            {
                let mut state = self.state.lock().await;
                if !state.pending.is_empty() {
                    let take = max.min(state.pending.len());
                    let batch: Vec<QueueMessage> = state
                        .pending
                        .drain(..take)
                        .map(|(id, body)| QueueMessage {
                            message_id: Some(id),
                            body,
                            receipt_handle: Uuid::new_v4().to_string(),
                        })
                        .collect();
                    for message in &batch {
                        state
                            .in_flight
                            .insert(message.receipt_handle.clone(), message.clone());
                    }
                    return Ok(batch);
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> BatchResult<()> {
        self.check_url(queue_url)?;
        let mut state = self.state.lock().await;
        let message = state.in_flight.remove(receipt_handle).ok_or_else(|| {
            BatchError::Queue(format!("unknown receipt handle {}", receipt_handle))
        })?;
        state.deleted.push(message);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_receive_then_delete() {
        let queue = InMemoryQueue::new("ingest");
        let url = queue.resolve_queue_url("ingest").await.unwrap();
        queue.send("one").await;
        queue.send("two").await;

        let batch = queue.receive(&url, 1, 0).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "one");
        assert_eq!(queue.pending_count().await, 1);
        assert_eq!(queue.in_flight_count().await, 1);

        queue.delete(&url, &batch[0].receipt_handle).await.unwrap();
        assert_eq!(queue.in_flight_count().await, 0);
        assert_eq!(queue.deleted().await.len(), 1);
        assert!(queue.delete(&url, &batch[0].receipt_handle).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let queue = InMemoryQueue::new("ingest");
        assert!(queue.resolve_queue_url("other").await.is_err());
        assert!(queue.receive("memory://other", 1, 0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_receive_waits_out_timeout() {
        let queue = InMemoryQueue::new("ingest");
        let started = Instant::now();
        let batch = queue.receive(&queue.url(), 1, 20).await.unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_long_poll_wakes_on_send() {
        let queue = Arc::new(InMemoryQueue::new("ingest"));
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(&queue.url(), 10, 5).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.send("late").await;

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "late");
    }
}
