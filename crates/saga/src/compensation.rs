//! Stock compensation: emitting inventory adjustments and applying them.

use chrono::Utc;
use common::OrderId;
use domain::{CartLineItem, DomainError, InventoryAdjustment, Order, Repository};
use metrics::counter;
use queue::{QueueClient, QueueTransport};
use record_store::{RecordStore, StoreError};

use crate::config::PollSettings;
use crate::drain::{DrainReport, acknowledge, release};
use crate::error::{Result, SagaError};

/// Sends inventory adjustments that put reserved stock back.
///
/// A send that still fails after the retry budget is an unrecovered
/// inconsistency: it is logged at error level, counted and returned as
/// [`SagaError::CompensationFailed`].
#[derive(Debug, Clone)]
pub struct CompensationEmitter<T> {
    client: QueueClient<T>,
    queue: String,
}

impl<T: QueueTransport> CompensationEmitter<T> {
    pub fn new(client: QueueClient<T>, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Restores `items` reserved for `order_id`. Each call is a distinct
    /// adjustment. Nothing is sent for an empty list.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn compensate(
        &self,
        order_id: &OrderId,
        customer_email: &str,
        items: &[CartLineItem],
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let adjustment = InventoryAdjustment::new(
            uuid::Uuid::new_v4().to_string(),
            order_id.clone(),
            customer_email,
            items.to_vec(),
        );
        self.emit(&adjustment).await
    }

    /// Restores every item of an order whose payment failed.
    ///
    /// The adjustment id depends only on the order, so handling the same
    /// failure twice restores the stock once.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn compensate_payment_failure(&self, order: &Order) -> Result<()> {
        if order.items.is_empty() {
            return Ok(());
        }
        let adjustment_id = common::content_hash(format!(
            "payment-fail:{}:{}",
            order.customer_id, order.order_id
        ));
        let adjustment = InventoryAdjustment::new(
            adjustment_id,
            order.order_id.clone(),
            order.customer_email.clone(),
            order.items.clone(),
        );
        self.emit(&adjustment).await
    }

    async fn emit(&self, adjustment: &InventoryAdjustment) -> Result<()> {
        match self.client.send_json(&self.queue, adjustment).await {
            Ok(_) => {
                counter!("compensations_emitted_total").increment(1);
                tracing::info!(
                    adjustment_id = %adjustment.adjustment_id,
                    units = adjustment.total_units(),
                    "compensation emitted"
                );
                Ok(())
            }
            Err(source) => {
                counter!("compensation_failures_total").increment(1);
                tracing::error!(
                    order_id = %adjustment.order_id,
                    adjustment_id = %adjustment.adjustment_id,
                    error = %source,
                    "compensation could not be delivered, stock is out of sync"
                );
                Err(SagaError::CompensationFailed {
                    order_id: adjustment.order_id.clone(),
                    source,
                })
            }
        }
    }
}

/// Consumes the inventory-update queue and restores stock.
#[derive(Debug, Clone)]
pub struct InventoryAdjustmentApplier<S, T> {
    repository: Repository<S>,
    client: QueueClient<T>,
    queue: String,
    poll: PollSettings,
}

impl<S: RecordStore, T: QueueTransport> InventoryAdjustmentApplier<S, T> {
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

    /// Applies one batch of pending adjustments, then deletes it.
    #[tracing::instrument(skip(self), fields(queue = %self.queue))]
    pub async fn apply_pending(&self) -> Result<DrainReport> {
        let batch = self
            .client
            .receive_batch::<InventoryAdjustment>(
                &self.queue,
                &self.poll.options,
                self.poll.empty_retries,
            )
            .await?;
        let mut report = DrainReport::for_batch(&batch);
        if batch.is_empty() {
            return Ok(report);
        }

        for delivered in &batch.delivered {
            match self.apply(&delivered.body).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.duplicates += 1,
                Err(err) => {
                    release(&self.client, &self.queue, batch.ack_entries()).await;
                    return Err(err);
                }
            }
        }

        acknowledge(&self.client, &self.queue, batch.ack_entries()).await?;
        Ok(report)
    }

    async fn apply(&self, adjustment: &InventoryAdjustment) -> Result<bool> {
        if self
            .repository
            .adjustment_applied(&adjustment.adjustment_id)
            .await?
        {
            tracing::debug!(adjustment_id = %adjustment.adjustment_id, "adjustment already applied");
            return Ok(false);
        }

        for (index, item) in adjustment.items.iter().enumerate() {
            let entry_id = format!("{}#{index}", adjustment.adjustment_id);
            match self
                .repository
                .restore_inventory_count(
                    &item.subcategory,
                    &item.item_id,
                    &item.size_key(),
                    item.quantity,
                    &entry_id,
                )
                .await
            {
                Ok(_) => {}
                Err(DomainError::Store(StoreError::NotFound { .. })) => {
                    tracing::warn!(
                        item_id = %item.item_id,
                        subcategory = %item.subcategory,
                        "adjustment names an unknown item, skipping"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.repository
            .mark_adjustment_applied(adjustment, Utc::now())
            .await?;
        counter!("inventory_units_restored_total").increment(u64::from(adjustment.total_units()));
        Ok(true)
    }
}
