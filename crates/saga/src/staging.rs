//! Order staging: confirmed checkouts travel through a FIFO queue before
//! their records are written.

use domain::{Repository, StagedOrder};
use metrics::counter;
use queue::{QueueClient, QueueTransport};
use record_store::RecordStore;

use crate::config::PollSettings;
use crate::drain::{DrainReport, acknowledge, release};
use crate::error::Result;

/// Enqueues staged orders and applies them to the store.
///
/// Applying is apply-then-delete: a crash between the two leads to a
/// redelivery, and the upserts make the second apply a no-op.
#[derive(Debug, Clone)]
pub struct OrderStagingCoordinator<S, T> {
    repository: Repository<S>,
    client: QueueClient<T>,
    queue: String,
    poll: PollSettings,
}

impl<S: RecordStore, T: QueueTransport> OrderStagingCoordinator<S, T> {
    pub fn new(
        repository: Repository<S>,
        client: QueueClient<T>,
        queue: impl Into<String>,
        poll: PollSettings,
    ) -> Self {
        Self {
            repository,
            client,
            queue: queue.into(),
            poll,
        }
    }

    /// Sends the order, customer and transaction as one message.
    ///
    /// The deduplication id is derived from the serialized triple, so
    /// re-sending identical content inside the dedup window is dropped by
    /// the queue. Returns the message id.
    #[tracing::instrument(skip(self, staged), fields(order_id = %staged.order.order_id))]
    pub async fn stage(&self, staged: &StagedOrder) -> Result<String> {
        let message_id = self.client.send_json(&self.queue, staged).await?;
        tracing::info!(%message_id, "order staged");
        Ok(message_id)
    }

    /// Applies one batch of staged orders and deletes it.
    ///
    /// An idle queue yields an empty report. Malformed messages are dropped
    /// with the batch. A copy of an order that already took a provider
    /// status is skipped and counted as a duplicate. If an apply fails the
    /// batch is released for redelivery and the error returned.
    #[tracing::instrument(skip(self), fields(queue = %self.queue))]
    pub async fn drain_staged(&self) -> Result<DrainReport> {
        let batch = self
            .client
            .receive_batch::<StagedOrder>(&self.queue, &self.poll.options, self.poll.empty_retries)
            .await?;
        let mut report = DrainReport::for_batch(&batch);
        if batch.is_empty() {
            return Ok(report);
        }

        for delivered in &batch.delivered {
            match self.repository.apply_staged(&delivered.body).await {
                Ok(true) => report.applied += 1,
                Ok(false) => {
                    tracing::debug!(
                        message_id = %delivered.message_id,
                        order_id = %delivered.body.order.order_id,
                        "order already settled, staged copy skipped"
                    );
                    report.duplicates += 1;
                }
                Err(err) => {
                    tracing::error!(
                        message_id = %delivered.message_id,
                        error = %err,
                        "failed to apply staged order"
                    );
                    release(&self.client, &self.queue, batch.ack_entries()).await;
                    return Err(err.into());
                }
            }
        }

        acknowledge(&self.client, &self.queue, batch.ack_entries()).await?;
        counter!("staged_orders_applied_total").increment(report.applied as u64);
        tracing::info!(applied = report.applied, malformed = report.malformed, "staged orders applied");

        Ok(report)
    }
}
