//! Stock reservation: concurrent availability checks, then conditional
//! decrements one line at a time.

use common::{ItemId, OrderId};
use domain::{CartLineItem, DomainError, Repository};
use metrics::counter;
use queue::QueueTransport;
use record_store::{RecordStore, StoreError};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::compensation::CompensationEmitter;
use crate::error::{Result, SagaError};

/// Availability of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockCheck {
    pub item_id: ItemId,
    pub available: bool,
}

/// Result of [`InventoryReservationService::reserve_stock`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    /// Every line was decremented.
    Reserved,
    /// At least one line could not be reserved. Lines decremented before the
    /// shortfall was found are listed in `compensated` and have been sent
    /// back through the inventory-update queue.
    OutOfStock {
        out_of_stock: Vec<ItemId>,
        compensated: Vec<CartLineItem>,
    },
}

impl ReservationOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved)
    }
}

pub struct InventoryReservationService<S, T> {
    repository: Repository<S>,
    compensation: CompensationEmitter<T>,
}

impl<S, T> InventoryReservationService<S, T>
where
    S: RecordStore + Clone + 'static,
    T: QueueTransport,
{
    pub fn new(repository: Repository<S>, compensation: CompensationEmitter<T>) -> Self {
        Self {
            repository,
            compensation,
        }
    }

    pub fn compensation(&self) -> &CompensationEmitter<T> {
        &self.compensation
    }

    /// Checks every line concurrently and waits for all checks to finish.
    ///
    /// Reads only. Results come back in cart order. A store failure in any
    /// check fails the whole call once the remaining checks have finished.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn verify_stock(&self, items: &[CartLineItem]) -> Result<Vec<StockCheck>> {
        let mut tasks = JoinSet::new();
        for (index, item) in items.iter().enumerate() {
            let repository = self.repository.clone();
            let item = item.clone();
            tasks.spawn(async move {
                let units = repository
                    .units_available(&item.subcategory, &item.item_id, &item.size_key())
                    .await?;
                let check = StockCheck {
                    available: units >= i64::from(item.quantity),
                    item_id: item.item_id,
                };
                Ok::<_, DomainError>((index, check))
            });
        }

        let mut checks: Vec<Option<StockCheck>> = vec![None; items.len()];
        let mut failure: Option<SagaError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, check))) => checks[index] = Some(check),
                Ok(Err(err)) => {
                    failure.get_or_insert(err.into());
                }
                Err(err) => {
                    failure.get_or_insert(err.into());
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(checks.into_iter().flatten().collect()),
        }
    }

    /// Decrements one line's stock if enough units remain.
    ///
    /// Returns the units left. A rejected condition, or an item missing from
    /// the catalog, is [`SagaError::StockInsufficient`] for that item.
    pub async fn update_inventory_count(&self, item: &CartLineItem) -> Result<i64> {
        let result = self
            .repository
            .update_inventory_count(
                &item.subcategory,
                &item.item_id,
                &item.size_key(),
                item.quantity,
            )
            .await;

        match result {
            Ok(remaining) => Ok(remaining),
            Err(err)
                if err.is_conditional_check_failed()
                    || matches!(err, DomainError::Store(StoreError::NotFound { .. })) =>
            {
                Err(SagaError::StockInsufficient {
                    item_id: item.item_id.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Reserves stock for a whole cart.
    ///
    /// Nothing is decremented unless every check passes. Decrements then run
    /// in cart order; the first rejected one stops the pass and the lines
    /// reserved before it are compensated. Any other failure also
    /// compensates, then returns the error.
    #[tracing::instrument(skip(self, customer_email, items))]
    pub async fn reserve_stock(
        &self,
        order_id: &OrderId,
        customer_email: &str,
        items: &[CartLineItem],
    ) -> Result<ReservationOutcome> {
        let checks = self.verify_stock(items).await?;
        let out_of_stock: Vec<ItemId> = checks
            .into_iter()
            .filter(|check| !check.available)
            .map(|check| check.item_id)
            .collect();

        if !out_of_stock.is_empty() {
            counter!("inventory_out_of_stock_total").increment(out_of_stock.len() as u64);
            tracing::info!(items = ?out_of_stock, "items out of stock");
            return Ok(ReservationOutcome::OutOfStock {
                out_of_stock,
                compensated: Vec::new(),
            });
        }

        let mut reserved: Vec<CartLineItem> = Vec::new();
        for item in items.iter().filter(|item| item.quantity > 0) {
            match self.update_inventory_count(item).await {
                Ok(remaining) => {
                    tracing::debug!(item_id = %item.item_id, remaining, "stock reserved");
                    reserved.push(item.clone());
                }
                Err(SagaError::StockInsufficient { item_id }) => {
                    counter!("inventory_out_of_stock_total").increment(1);
                    tracing::warn!(
                        item_id = %item_id,
                        reserved = reserved.len(),
                        "stock taken between check and decrement"
                    );
                    self.compensation
                        .compensate(order_id, customer_email, &reserved)
                        .await?;
                    return Ok(ReservationOutcome::OutOfStock {
                        out_of_stock: vec![item_id],
                        compensated: reserved,
                    });
                }
                Err(err) => {
                    self.compensation
                        .compensate(order_id, customer_email, &reserved)
                        .await?;
                    return Err(err);
                }
            }
        }

        Ok(ReservationOutcome::Reserved)
    }
}
