//! Typed access to the saga's tables.
//!
//! Every table is a plain [`RecordStore`] table holding JSON documents. This
//! module owns the key layout and the update expressions that mutate records
//! in place, so callers never build keys or field paths themselves.

use chrono::{DateTime, Utc};
use common::{CustomerId, ItemId, OrderId, TransactionId};
use record_store::{Condition, RecordKey, RecordStore, StoreError, UpdateExpression};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::customer::Customer;
use crate::error::{DomainError, Result};
use crate::inventory::{InventoryAdjustment, StoreItem};
use crate::order::{Money, Order, OrderStatus};
use crate::payment::{PaymentStatus, Transaction};
use crate::shipping::{ParcelTemplate, Shipment};
use crate::staging::StagedOrder;
use crate::tables::TableNames;

fn customer_key(customer_id: &CustomerId) -> RecordKey {
    RecordKey::partition(customer_id.as_str())
}

fn order_key(customer_id: &CustomerId, order_id: &OrderId) -> RecordKey {
    RecordKey::composite(customer_id.as_str(), order_id.as_str())
}

fn transaction_key(order_id: &OrderId, transaction_id: &TransactionId) -> RecordKey {
    RecordKey::composite(order_id.as_str(), transaction_id.as_str())
}

fn store_item_key(subcategory: &str, item_id: &ItemId) -> RecordKey {
    RecordKey::composite(subcategory, item_id.as_str())
}

fn adjustment_key(adjustment_id: &str) -> RecordKey {
    RecordKey::partition(adjustment_id)
}

/// Repository over a [`RecordStore`].
///
/// Cheap to clone when the store is; each saga component holds its own.
#[derive(Debug, Clone)]
pub struct Repository<S> {
    store: S,
    tables: TableNames,
}

impl<S: RecordStore> Repository<S> {
    pub fn new(store: S, tables: TableNames) -> Self {
        Self { store, tables }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    async fn load<T: DeserializeOwned>(&self, table: &str, key: &RecordKey) -> Result<Option<T>> {
        match self.store.get(table, key).await? {
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize + Sync>(&self, table: &str, key: &RecordKey, value: &T) -> Result<()> {
        let data = serde_json::to_value(value)?;
        self.store.put(table, key, data).await?;
        Ok(())
    }

    async fn modify<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &RecordKey,
        update: &UpdateExpression,
    ) -> Result<T> {
        let data = self.store.update(table, key, update).await?;
        Ok(serde_json::from_value(data)?)
    }

    // Customers

    pub async fn put_customer(&self, customer: &Customer) -> Result<()> {
        self.save(&self.tables.customers, &customer_key(&customer.customer_id), customer)
            .await
    }

    pub async fn get_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>> {
        self.load(&self.tables.customers, &customer_key(customer_id)).await
    }

    pub async fn require_customer(&self, customer_id: &CustomerId) -> Result<Customer> {
        self.get_customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "customer",
                key: customer_id.to_string(),
            })
    }

    /// Counts a newly opened order against the customer and flags the open
    /// order. Returns the updated customer.
    #[tracing::instrument(skip(self))]
    pub async fn register_open_order(&self, customer_id: &CustomerId) -> Result<Customer> {
        let update = UpdateExpression::new()
            .add("orders", 1)
            .set("open_order", true);
        self.modify(&self.tables.customers, &customer_key(customer_id), &update)
            .await
            .map_err(|err| not_found_as(err, "customer", customer_id.as_str()))
    }

    /// Adds a paid order to the customer's purchase history.
    ///
    /// Guarded by a per-order marker, so a redelivered status update cannot
    /// count the same order twice. Returns false if it was already recorded.
    #[tracing::instrument(skip(self))]
    pub async fn record_customer_purchase(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<bool> {
        let marker = format!("paid_orders.{order_id}");
        let update = UpdateExpression::new()
            .set(marker.as_str(), serde_json::to_value(amount)?)
            .add("total_spent.cents", amount.cents())
            .add("purchases", 1)
            .set("open_order", false)
            .with_condition(Condition::AttributeNotExists(marker.as_str().into()));

        match self
            .store
            .update(&self.tables.customers, &customer_key(customer_id), &update)
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::ConditionalCheckFailed { .. }) => Ok(false),
            Err(err) => Err(not_found_as(err.into(), "customer", customer_id.as_str())),
        }
    }

    // Orders

    pub async fn put_order(&self, order: &Order) -> Result<()> {
        self.save(
            &self.tables.orders,
            &order_key(&order.customer_id, &order.order_id),
            order,
        )
        .await
    }

    pub async fn get_order(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
    ) -> Result<Option<Order>> {
        self.load(&self.tables.orders, &order_key(customer_id, order_id))
            .await
    }

    pub async fn require_order(&self, customer_id: &CustomerId, order_id: &OrderId) -> Result<Order> {
        self.get_order(customer_id, order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "order",
                key: format!("{customer_id}/{order_id}"),
            })
    }

    /// Moves the order from `from` to `to` if it still is in `from`.
    ///
    /// Returns false when another caller changed the status first.
    #[tracing::instrument(skip(self))]
    pub async fn transition_order_status(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let update = UpdateExpression::new()
            .set("order_status", to.as_str())
            .with_condition(Condition::OneOf {
                path: "order_status".into(),
                values: vec![from.as_str().into()],
            });

        match self
            .store
            .update(&self.tables.orders, &order_key(customer_id, order_id), &update)
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::ConditionalCheckFailed { .. }) => Ok(false),
            Err(err) => Err(not_found_as(
                err.into(),
                "order",
                &format!("{customer_id}/{order_id}"),
            )),
        }
    }

    /// Records the provider status on the order and moves the order status
    /// when the payment status maps to one.
    ///
    /// Written only if the order's current payment status is one of
    /// [`PaymentStatus::predecessors`]. Returns `None` when it is not.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_payment_status(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Option<Order>> {
        let allowed = status
            .predecessors()
            .iter()
            .map(|previous| match previous {
                Some(previous) => Value::from(previous.as_str()),
                None => Value::Null,
            })
            .collect();
        let mut update = UpdateExpression::new()
            .set("payment_status", status.as_str())
            .with_condition(Condition::OneOf {
                path: "payment_status".into(),
                values: allowed,
            });
        if let Some(order_status) = status.order_status() {
            update = update.set("order_status", order_status.as_str());
        }

        match self
            .modify(&self.tables.orders, &order_key(customer_id, order_id), &update)
            .await
        {
            Ok(order) => Ok(Some(order)),
            Err(DomainError::Store(StoreError::ConditionalCheckFailed { .. })) => Ok(None),
            Err(err) => Err(not_found_as(err, "order", &format!("{customer_id}/{order_id}"))),
        }
    }

    /// Remembers that fulfillment was told about `status`.
    pub async fn mark_order_notified(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order> {
        let update = UpdateExpression::new().set("notified_payment_status", status.as_str());
        self.modify(&self.tables.orders, &order_key(customer_id, order_id), &update)
            .await
            .map_err(|err| not_found_as(err, "order", &format!("{customer_id}/{order_id}")))
    }

    // Transactions

    pub async fn put_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.save(
            &self.tables.transactions,
            &transaction_key(&transaction.order_id, &transaction.transaction_id),
            transaction,
        )
        .await
    }

    pub async fn get_transaction(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Option<Transaction>> {
        self.load(
            &self.tables.transactions,
            &transaction_key(order_id, transaction_id),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_transaction_payment(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
        status: PaymentStatus,
        payment_method: &str,
        provider_tx_id: &str,
    ) -> Result<Transaction> {
        let update = UpdateExpression::new()
            .set("payment_status", status.as_str())
            .set("payment_method", payment_method)
            .set("provider_tx_id", provider_tx_id);

        self.modify(
            &self.tables.transactions,
            &transaction_key(order_id, transaction_id),
            &update,
        )
        .await
        .map_err(|err| not_found_as(err, "transaction", &format!("{order_id}/{transaction_id}")))
    }

    /// Writes the order, transaction and customer of a confirmed checkout.
    ///
    /// Applying the same staged order twice leaves the same state. Once a
    /// provider status has been applied to the order the staged copy is
    /// stale: nothing is written and false is returned.
    #[tracing::instrument(skip(self, staged), fields(order_id = %staged.order.order_id))]
    pub async fn apply_staged(&self, staged: &StagedOrder) -> Result<bool> {
        let order = &staged.order;
        let fields: Map<String, Value> = serde_json::from_value(serde_json::to_value(order)?)?;
        let update = fields
            .into_iter()
            .fold(UpdateExpression::new(), |update, (field, value)| {
                update.set(field.as_str(), value)
            })
            .with_condition(Condition::OneOf {
                path: "payment_status".into(),
                values: vec![Value::Null],
            });

        match self
            .store
            .update(
                &self.tables.orders,
                &order_key(&order.customer_id, &order.order_id),
                &update,
            )
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => self.put_order(order).await?,
            Err(StoreError::ConditionalCheckFailed { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        self.put_transaction(&staged.transaction).await?;
        self.put_customer(&staged.customer).await?;
        Ok(true)
    }

    // Inventory

    pub async fn put_store_item(&self, item: &StoreItem) -> Result<()> {
        self.save(
            &self.tables.store_items,
            &store_item_key(&item.subcategory, &item.item_id),
            item,
        )
        .await
    }

    pub async fn get_store_item(
        &self,
        subcategory: &str,
        item_id: &ItemId,
    ) -> Result<Option<StoreItem>> {
        self.load(&self.tables.store_items, &store_item_key(subcategory, item_id))
            .await
    }

    /// Units on hand for one size. A missing item or size counts as zero.
    pub async fn units_available(
        &self,
        subcategory: &str,
        item_id: &ItemId,
        size_key: &str,
    ) -> Result<i64> {
        Ok(self
            .get_store_item(subcategory, item_id)
            .await?
            .and_then(|item| item.units_available.get(size_key).copied())
            .unwrap_or(0))
    }

    /// Decrements stock only if at least `count` units remain. Returns the
    /// new count; fails with a conditional-check error when short.
    #[tracing::instrument(skip(self))]
    pub async fn update_inventory_count(
        &self,
        subcategory: &str,
        item_id: &ItemId,
        size_key: &str,
        count: u32,
    ) -> Result<i64> {
        let path = format!("units_available.{size_key}");
        let update = UpdateExpression::new()
            .add(path.as_str(), -i64::from(count))
            .with_condition(Condition::GreaterOrEqual {
                path: path.as_str().into(),
                value: i64::from(count),
            });

        let item: StoreItem = self
            .modify(
                &self.tables.store_items,
                &store_item_key(subcategory, item_id),
                &update,
            )
            .await?;
        Ok(item.units_available.get(size_key).copied().unwrap_or(0))
    }

    /// Adds `count` units back, at most once per `entry_id`.
    ///
    /// The marker and the increment are written in the same conditional
    /// update. Returns false if the entry was already restored.
    #[tracing::instrument(skip(self))]
    pub async fn restore_inventory_count(
        &self,
        subcategory: &str,
        item_id: &ItemId,
        size_key: &str,
        count: u32,
        entry_id: &str,
    ) -> Result<bool> {
        let marker = format!("applied_adjustments.{entry_id}");
        let update = UpdateExpression::new()
            .add(format!("units_available.{size_key}").as_str(), i64::from(count))
            .set(marker.as_str(), true)
            .with_condition(Condition::AttributeNotExists(marker.as_str().into()));

        match self
            .store
            .update(
                &self.tables.store_items,
                &store_item_key(subcategory, item_id),
                &update,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::ConditionalCheckFailed { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn adjustment_applied(&self, adjustment_id: &str) -> Result<bool> {
        Ok(self
            .store
            .get(&self.tables.inventory_adjustments, &adjustment_key(adjustment_id))
            .await?
            .is_some())
    }

    pub async fn mark_adjustment_applied(
        &self,
        adjustment: &InventoryAdjustment,
        applied_at: DateTime<Utc>,
    ) -> Result<()> {
        let data = json!({
            "adjustment_id": adjustment.adjustment_id,
            "order_id": adjustment.order_id,
            "units": adjustment.total_units(),
            "applied_at": applied_at,
        });
        self.store
            .put(
                &self.tables.inventory_adjustments,
                &adjustment_key(&adjustment.adjustment_id),
                data,
            )
            .await?;
        Ok(())
    }

    // Shipping

    pub async fn put_parcel(&self, parcel: &ParcelTemplate) -> Result<()> {
        self.save(
            &self.tables.parcels,
            &RecordKey::composite(parcel.carrier.as_str(), parcel.parcel_id.as_str()),
            parcel,
        )
        .await
    }

    /// Every parcel template offered by `carrier`.
    pub async fn parcels(&self, carrier: &str) -> Result<Vec<ParcelTemplate>> {
        self.store
            .scan(&self.tables.parcels, carrier)
            .await?
            .into_iter()
            .map(|record| serde_json::from_value(record.data).map_err(DomainError::from))
            .collect()
    }

    pub async fn put_shipment(&self, shipment: &Shipment) -> Result<()> {
        self.save(
            &self.tables.shipments,
            &order_key(&shipment.customer_id, &shipment.order_id),
            shipment,
        )
        .await
    }

    pub async fn get_shipment(
        &self,
        customer_id: &CustomerId,
        order_id: &OrderId,
    ) -> Result<Option<Shipment>> {
        self.load(&self.tables.shipments, &order_key(customer_id, order_id))
            .await
    }
}

/// Rewrites a store-level `NotFound` into a domain `NotFound` naming the
/// entity.
fn not_found_as(err: DomainError, entity: &'static str, key: &str) -> DomainError {
    match err {
        DomainError::Store(StoreError::NotFound { .. }) => DomainError::NotFound {
            entity,
            key: key.to_string(),
        },
        other => other,
    }
}
