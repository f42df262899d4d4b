use std::time::Duration;

use async_trait::async_trait;

use crate::{BatchEntry, BatchOutcome, OutgoingMessage, ReceiveOptions, ReceivedMessage, Result};

/// A FIFO message queue service.
///
/// Implementations perform a single attempt per call; retrying is the job
/// of [`QueueClient`](crate::QueueClient).
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Sends a message and returns its id. A duplicate inside the dedup
    /// window is accepted without being enqueued again.
    async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<String>;

    /// Receives up to `options.max_messages` visible messages and hides them
    /// for `options.visibility_timeout`.
    async fn receive(&self, queue: &str, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>>;

    /// Deletes received messages by receipt handle.
    async fn delete_batch(&self, queue: &str, entries: &[BatchEntry]) -> Result<BatchOutcome>;

    /// Resets the visibility timeout of received messages.
    async fn change_visibility_batch(
        &self,
        queue: &str,
        entries: &[BatchEntry],
        timeout: Duration,
    ) -> Result<BatchOutcome>;
}

/// A fan-out notification topic.
#[async_trait]
pub trait TopicTransport: Send + Sync {
    async fn publish(&self, topic: &str, message: OutgoingMessage) -> Result<String>;
}
