//! Applying provider payment statuses to staged orders.

use domain::{DomainError, Order, PaymentStatus, PaymentStatusMessage, Repository};
use metrics::counter;
use queue::{Delivered, QueueClient, QueueTransport, TopicClient, TopicTransport};
use record_store::RecordStore;

use crate::compensation::CompensationEmitter;
use crate::config::PollSettings;
use crate::drain::{DrainReport, acknowledge, release};
use crate::error::{Result, SagaError};

/// Consumes the payment-status queue.
///
/// Per message: the transaction and order take the new status, the
/// customer's purchase history is updated on success, reserved stock is
/// compensated on failure, and the updated order is published to the
/// fulfillment topic. Statuses for one order may arrive in any order; one
/// that would move the order backwards is dropped. Each step is skipped
/// when the order shows it already happened, so a redelivered message has
/// no further effect.
pub struct PaymentStatusProcessor<S, T, P> {
    repository: Repository<S>,
    client: QueueClient<T>,
    topic: TopicClient<P>,
    compensation: CompensationEmitter<T>,
    queue: String,
    topic_name: String,
    poll: PollSettings,
}

impl<S, T, P> PaymentStatusProcessor<S, T, P>
where
    S: RecordStore,
    T: QueueTransport,
    P: TopicTransport,
{
    pub fn new(
        repository: Repository<S>,
        client: QueueClient<T>,
        topic: TopicClient<P>,
        compensation: CompensationEmitter<T>,
        queue: impl Into<String>,
        topic_name: impl Into<String>,
        poll: PollSettings,
    ) -> Self {
        Self {
            repository,
            client,
            topic,
            compensation,
            queue: queue.into(),
            topic_name: topic_name.into(),
            poll,
        }
    }

    /// Processes one batch of status messages and deletes it.
    ///
    /// Every status in the batch is validated before anything is applied; an
    /// unknown one fails the batch with [`SagaError::InvalidPaymentStatus`]
    /// and leaves it on the queue. A failure while applying releases the
    /// batch so it is retried whole.
    #[tracing::instrument(skip(self), fields(queue = %self.queue))]
    pub async fn process_payment_statuses(&self) -> Result<DrainReport> {
        let batch = self
            .client
            .receive_batch::<PaymentStatusMessage>(
                &self.queue,
                &self.poll.options,
                self.poll.empty_retries,
            )
            .await?;
        let mut report = DrainReport::for_batch(&batch);
        if batch.is_empty() {
            return Ok(report);
        }

        let validated = batch
            .delivered
            .iter()
            .map(|delivered| validate(delivered).map(|status| (delivered, status)))
            .collect::<Result<Vec<_>>>()?;

        for (delivered, status) in validated {
            match self.apply(&delivered.body, status).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.duplicates += 1,
                Err(err) => {
                    tracing::error!(
                        message_id = %delivered.message_id,
                        order_id = %delivered.body.order_id,
                        error = %err,
                        "failed to apply payment status"
                    );
                    release(&self.client, &self.queue, batch.ack_entries()).await;
                    return Err(err);
                }
            }
        }

        acknowledge(&self.client, &self.queue, batch.ack_entries()).await?;
        counter!("payment_statuses_processed_total").increment(report.applied as u64);

        Ok(report)
    }

    /// Applies one status. Returns false if nothing was left to do.
    ///
    /// The order's payment status is moved with a conditional write that
    /// only accepts [`PaymentStatus::predecessors`]; a status arriving after
    /// the order moved past it is dropped. The side effects run until the
    /// fulfillment topic has been told, and each is idempotent.
    #[tracing::instrument(skip(self, message), fields(order_id = %message.order_id))]
    async fn apply(&self, message: &PaymentStatusMessage, status: PaymentStatus) -> Result<bool> {
        let not_staged = || SagaError::OrderNotStaged {
            order_id: message.order_id.clone(),
        };

        let mut order = self
            .repository
            .get_order(&message.customer_id, &message.order_id)
            .await?
            .filter(|order| order.order_status.accepts_payment_updates())
            .ok_or_else(not_staged)?;
        let mut changed = false;

        if order.payment_status != Some(status) {
            if !status.can_follow(order.payment_status) {
                skip_out_of_order(&order, status);
                return Ok(false);
            }
            self.repository
                .get_transaction(&message.order_id, &message.transaction_id)
                .await?
                .ok_or_else(not_staged)?;

            order = match self
                .repository
                .update_order_payment_status(&order.customer_id, &order.order_id, status)
                .await?
            {
                Some(updated) => updated,
                None => {
                    let current = self
                        .repository
                        .require_order(&order.customer_id, &order.order_id)
                        .await?;
                    if current.payment_status != Some(status) {
                        skip_out_of_order(&current, status);
                        return Ok(false);
                    }
                    current
                }
            };

            self.repository
                .update_transaction_payment(
                    &message.order_id,
                    &message.transaction_id,
                    status,
                    &message.payment_method,
                    &message.provider_tx_id,
                )
                .await
                .map_err(|err| match err {
                    DomainError::NotFound { .. } => not_staged(),
                    other => other.into(),
                })?;
            changed = true;
        }

        if order.notified_payment_status != Some(status) {
            self.settle(&order, status).await?;

            let dedup_id = common::content_hash(format!("{}:{}", order.order_id, status));
            self.topic
                .publish_json(&self.topic_name, &order, &dedup_id)
                .await?;
            order = self
                .repository
                .mark_order_notified(&order.customer_id, &order.order_id, status)
                .await?;
            changed = true;
        }

        tracing::info!(
            status = %status,
            order_status = %order.order_status,
            changed,
            "payment status applied"
        );
        Ok(changed)
    }

    /// Customer bookkeeping on success, stock restore on failure.
    async fn settle(&self, order: &Order, status: PaymentStatus) -> Result<()> {
        match status {
            PaymentStatus::PaymentSuccess => {
                let recorded = self
                    .repository
                    .record_customer_purchase(
                        &order.customer_id,
                        &order.order_id,
                        order.totals.order_total,
                    )
                    .await?;
                tracing::debug!(recorded, "customer purchase");
            }
            PaymentStatus::PaymentFail => {
                self.compensation.compensate_payment_failure(order).await?;
            }
            PaymentStatus::InProgress
            | PaymentStatus::RefundSuccess
            | PaymentStatus::RefundFail
            | PaymentStatus::Disputed => {}
        }
        Ok(())
    }
}

fn skip_out_of_order(order: &Order, status: PaymentStatus) {
    counter!("payment_status_out_of_order_total").increment(1);
    tracing::warn!(
        status = %status,
        current = ?order.payment_status,
        order_status = %order.order_status,
        "payment status arrived after the order moved on, dropped"
    );
}

fn validate(delivered: &Delivered<PaymentStatusMessage>) -> Result<PaymentStatus> {
    delivered.body.parse_status().map_err(|_| {
        counter!("payment_status_invalid_total").increment(1);
        tracing::error!(
            message_id = %delivered.message_id,
            status = %delivered.body.status,
            "invalid payment status"
        );
        SagaError::InvalidPaymentStatus {
            message_id: delivered.message_id.clone(),
            value: delivered.body.status.clone(),
        }
    })
}
