use std::collections::HashSet;
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    BatchEntry, Delivered, OutgoingMessage, QueueError, QueueTransport, ReceiveOptions,
    ReceivedBatch, ReceivedMessage, Result, RetryPolicy, TopicTransport,
};

#[derive(Debug, Clone, Copy)]
enum BatchOp {
    Delete,
    ChangeVisibility(Duration),
}

impl BatchOp {
    fn name(self) -> &'static str {
        match self {
            BatchOp::Delete => "delete",
            BatchOp::ChangeVisibility(_) => "change_visibility",
        }
    }
}

fn record_retry(operation: &'static str, queue: &str, err: &QueueError, delay: Duration) {
    tracing::warn!(operation, queue, error = %err, ?delay, "queue call failed, retrying");
    metrics::counter!("queue_retries_total", "operation" => operation).increment(1);
}

/// Retrying client over a [`QueueTransport`].
#[derive(Debug, Clone)]
pub struct QueueClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: QueueTransport> QueueClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns a client sharing the same transport with a different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self
    where
        T: Clone,
    {
        Self {
            transport: self.transport.clone(),
            policy,
        }
    }

    /// Serializes `body` and sends it with a deduplication id (and group id)
    /// derived from the serialized content.
    pub async fn send_json<M: Serialize + Sync + ?Sized>(
        &self,
        queue: &str,
        body: &M,
    ) -> Result<String> {
        let body = serde_json::to_string(body)?;
        let dedup_id = common::content_hash(&body);
        self.send(
            queue,
            OutgoingMessage {
                body,
                deduplication_id: dedup_id.clone(),
                group_id: dedup_id,
            },
        )
        .await
    }

    /// Sends `body` with an explicit deduplication id, used when distinct
    /// attempts with identical content must not collapse (or the reverse).
    pub async fn send_json_with_dedup<M: Serialize + Sync + ?Sized>(
        &self,
        queue: &str,
        body: &M,
        deduplication_id: &str,
    ) -> Result<String> {
        let body = serde_json::to_string(body)?;
        self.send(
            queue,
            OutgoingMessage {
                body,
                deduplication_id: deduplication_id.to_string(),
                group_id: deduplication_id.to_string(),
            },
        )
        .await
    }

    /// Sends a message, retrying transient failures with backoff.
    #[tracing::instrument(skip(self, message), fields(dedup_id = %message.deduplication_id))]
    pub async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<String> {
        let message = &message;
        (|| async { self.transport.send(queue, message.clone()).await })
            .retry(self.policy.backoff())
            .when(QueueError::is_transient)
            .notify(|err: &QueueError, delay: Duration| record_retry("send", queue, err, delay))
            .await
    }

    /// Single receive call with transient-failure retry. An empty result is
    /// returned as is.
    pub async fn receive_raw(
        &self,
        queue: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>> {
        (|| async { self.transport.receive(queue, options).await })
            .retry(self.policy.backoff())
            .when(QueueError::is_transient)
            .notify(|err: &QueueError, delay: Duration| record_retry("receive", queue, err, delay))
            .await
    }

    /// Receives and decodes a batch.
    ///
    /// An empty receive is retried `empty_retries` times with the policy's
    /// backoff, then an empty batch is returned; an idle queue is not an
    /// error. Malformed bodies are logged and reported in
    /// [`ReceivedBatch::malformed`]. Redeliveries of the same message id
    /// within the batch are dropped.
    #[tracing::instrument(skip(self, options))]
    pub async fn receive_batch<M: DeserializeOwned>(
        &self,
        queue: &str,
        options: &ReceiveOptions,
        empty_retries: usize,
    ) -> Result<ReceivedBatch<M>> {
        let mut empty_backoff = self.policy.backoff().with_max_times(empty_retries).build();

        loop {
            let messages = self.receive_raw(queue, options).await?;
            if !messages.is_empty() {
                return Ok(Self::decode(queue, messages));
            }

            match empty_backoff.next() {
                Some(delay) => {
                    tracing::debug!(queue, ?delay, "queue empty, polling again");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::debug!(queue, "queue empty after retries");
                    return Ok(ReceivedBatch::default());
                }
            }
        }
    }

    fn decode<M: DeserializeOwned>(
        queue: &str,
        messages: Vec<ReceivedMessage>,
    ) -> ReceivedBatch<M> {
        let mut seen = HashSet::new();
        let mut batch = ReceivedBatch::default();

        for message in messages {
            if !seen.insert(message.message_id.clone()) {
                tracing::debug!(queue, message_id = %message.message_id, "duplicate delivery in batch");
                continue;
            }

            match serde_json::from_str::<M>(&message.body) {
                Ok(body) => batch.delivered.push(Delivered {
                    message_id: message.message_id,
                    receipt_handle: message.receipt_handle,
                    body,
                }),
                Err(err) => {
                    tracing::warn!(
                        queue,
                        message_id = %message.message_id,
                        error = %err,
                        "dropping malformed message"
                    );
                    metrics::counter!("queue_malformed_messages_total").increment(1);
                    batch.malformed.push(message.entry());
                }
            }
        }

        batch
    }

    /// Deletes a batch, retrying failed entries until all succeed or the
    /// retry budget is spent.
    pub async fn delete_batch(&self, queue: &str, entries: Vec<BatchEntry>) -> Result<()> {
        self.run_batch(queue, BatchOp::Delete, entries).await
    }

    /// Changes the visibility timeout of a batch, retrying failed entries.
    /// A zero timeout releases the messages for immediate redelivery.
    pub async fn change_visibility_batch(
        &self,
        queue: &str,
        entries: Vec<BatchEntry>,
        timeout: Duration,
    ) -> Result<()> {
        self.run_batch(queue, BatchOp::ChangeVisibility(timeout), entries)
            .await
    }

    async fn run_batch(&self, queue: &str, op: BatchOp, entries: Vec<BatchEntry>) -> Result<()> {
        let mut pending = entries;
        let mut backoff = self.policy.backoff().build();

        while !pending.is_empty() {
            let result = match op {
                BatchOp::Delete => self.transport.delete_batch(queue, &pending).await,
                BatchOp::ChangeVisibility(timeout) => {
                    self.transport
                        .change_visibility_batch(queue, &pending, timeout)
                        .await
                }
            };

            let failure = match result {
                Ok(outcome) if outcome.is_complete() => return Ok(()),
                Ok(outcome) => {
                    let failed: HashSet<String> = outcome.failed.into_iter().map(|f| f.id).collect();
                    pending.retain(|entry| failed.contains(&entry.id));
                    QueueError::BatchIncomplete {
                        operation: op.name(),
                        failed: pending.len(),
                    }
                }
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            match backoff.next() {
                Some(delay) => {
                    record_retry(op.name(), queue, &failure, delay);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(queue, operation = op.name(), error = %failure, "batch retries exhausted");
                    return Err(QueueError::BatchIncomplete {
                        operation: op.name(),
                        failed: pending.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Retrying publisher over a [`TopicTransport`].
#[derive(Debug, Clone)]
pub struct TopicClient<P> {
    transport: P,
    policy: RetryPolicy,
}

impl<P: TopicTransport> TopicClient<P> {
    pub fn new(transport: P, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &P {
        &self.transport
    }

    /// Publishes `body` with an explicit deduplication id.
    #[tracing::instrument(skip(self, body))]
    pub async fn publish_json<M: Serialize + Sync + ?Sized>(
        &self,
        topic: &str,
        body: &M,
        deduplication_id: &str,
    ) -> Result<String> {
        let message = OutgoingMessage {
            body: serde_json::to_string(body)?,
            deduplication_id: deduplication_id.to_string(),
            group_id: deduplication_id.to_string(),
        };
        let message = &message;

        (|| async { self.transport.publish(topic, message.clone()).await })
            .retry(self.policy.backoff())
            .when(QueueError::is_transient)
            .notify(|err: &QueueError, delay: Duration| record_retry("publish", topic, err, delay))
            .await
    }
}
