//! Checkout: opening orders and the payment step.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{CustomerId, ItemId, OrderId};
use domain::{
    Address, CartLineItem, Money, Order, OrderStatus, OrderTotals, PaymentStatusMessage, Receipt,
    Repository, StagedOrder, Transaction,
};
use metrics::{counter, histogram};
use queue::{QueueClient, QueueTransport};
use record_store::RecordStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::inventory::{InventoryReservationService, ReservationOutcome};
use crate::staging::OrderStagingCoordinator;

/// Payment details for an open order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    /// Defaults to the address stored on the order.
    #[serde(default)]
    pub shipping_address: Option<Address>,
    /// Defaults to the shipping address.
    #[serde(default)]
    pub billing_address: Option<Address>,
    /// Store the addresses on the customer for later orders.
    #[serde(default)]
    pub save_addresses: bool,
}

/// How the payment step ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Stock reserved and the order staged; awaiting provider confirmation.
    Staged(Receipt),
    /// Nothing is held for the order. The customer should edit the cart.
    OutOfStock { order_id: OrderId, items: Vec<ItemId> },
    /// The order outlived its TTL. The customer has to start over.
    Expired { order_id: OrderId },
}

pub struct CheckoutCoordinator<S, T> {
    repository: Repository<S>,
    reservation: InventoryReservationService<S, T>,
    staging: OrderStagingCoordinator<S, T>,
    payments: QueueClient<T>,
    payment_queue: String,
    order_ttl_ms: u64,
    sales_tax_rate: f64,
}

impl<S, T> CheckoutCoordinator<S, T>
where
    S: RecordStore + Clone + 'static,
    T: QueueTransport,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Repository<S>,
        reservation: InventoryReservationService<S, T>,
        staging: OrderStagingCoordinator<S, T>,
        payments: QueueClient<T>,
        payment_queue: impl Into<String>,
        order_ttl_ms: u64,
        sales_tax_rate: f64,
    ) -> Self {
        Self {
            repository,
            reservation,
            staging,
            payments,
            payment_queue: payment_queue.into(),
            order_ttl_ms,
            sales_tax_rate,
        }
    }

    pub fn reservation(&self) -> &InventoryReservationService<S, T> {
        &self.reservation
    }

    /// Opens an order for a customer's cart.
    ///
    /// The order is numbered after the customer's order count, priced with
    /// sales tax and no shipping yet, and ships to the customer's stored
    /// address unless the payment step says otherwise.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn open_order(
        &self,
        customer_id: &CustomerId,
        items: Vec<CartLineItem>,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let customer = self.repository.register_open_order(customer_id).await?;
        let order_id = OrderId::for_customer(customer_id, customer.orders);
        let totals = OrderTotals::compute(&items, Money::zero(), self.sales_tax_rate, Money::zero());

        let mut order = Order::open(
            order_id,
            customer_id.clone(),
            customer.email.clone(),
            items,
            totals,
            self.order_ttl_ms,
            now,
        );
        order.shipping_address = customer.shipping_address;
        order.billing_address = customer.billing_address;
        self.repository.put_order(&order).await?;

        counter!("orders_opened_total").increment(1);
        tracing::info!(order_id = %order.order_id, total = %order.totals.order_total, "order opened");
        Ok(order)
    }

    /// Runs the payment step: reserve stock, start a transaction and stage
    /// the order.
    ///
    /// The order is first moved from `OPEN` to `PAYMENT_IN_PROGRESS` with a
    /// conditional write, so only one request per order gets to reserve
    /// stock; the others fail with [`SagaError::InvalidOrderState`]. The
    /// order goes back to `OPEN` if nothing ends up staged.
    ///
    /// Stock is decremented here, before the provider confirms; a later
    /// payment failure gives it back. If staging fails the reservation is
    /// compensated before the error is returned.
    #[tracing::instrument(skip(self, request, now), fields(order_id = %request.order_id))]
    pub async fn submit_payment(
        &self,
        request: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome> {
        counter!("checkout_requests_total").increment(1);
        let started = Instant::now();

        let mut customer = self.repository.require_customer(&request.customer_id).await?;
        let mut order = self
            .repository
            .require_order(&request.customer_id, &request.order_id)
            .await?;

        if !order.order_status.can_submit_payment() {
            return Err(SagaError::InvalidOrderState {
                order_id: order.order_id,
                status: order.order_status,
            });
        }
        if order.is_expired(now) {
            counter!("checkout_expired_total").increment(1);
            tracing::info!(expired_at = %order.expires_at(), "order expired");
            return Ok(CheckoutOutcome::Expired {
                order_id: order.order_id,
            });
        }

        self.claim(&order).await?;

        let reservation = match self
            .reservation
            .reserve_stock(&order.order_id, &order.customer_email, &order.items)
            .await
        {
            Ok(reservation) => reservation,
            // Stock that could not be given back stays tied to this order.
            Err(err @ SagaError::CompensationFailed { .. }) => return Err(err),
            Err(err) => {
                self.reopen(&order).await;
                return Err(err);
            }
        };
        if let ReservationOutcome::OutOfStock { out_of_stock, .. } = reservation {
            self.reopen(&order).await;
            return Ok(CheckoutOutcome::OutOfStock {
                order_id: order.order_id,
                items: out_of_stock,
            });
        }

        let shipping_address = request
            .shipping_address
            .unwrap_or_else(|| order.shipping_address.clone());
        let billing_address = request
            .billing_address
            .unwrap_or_else(|| shipping_address.clone());
        if request.save_addresses {
            customer.shipping_address = shipping_address.clone();
            customer.billing_address = billing_address.clone();
        }

        let transaction = Transaction::begin(&order, now);
        order.transaction_id = Some(transaction.transaction_id.clone());
        order.order_status = OrderStatus::PaymentInProgress;
        order.shipping_address = shipping_address;
        order.billing_address = billing_address;

        let staged = StagedOrder {
            order,
            customer,
            transaction,
        };
        if let Err(err) = self.staging.stage(&staged).await {
            tracing::error!(error = %err, "staging failed, releasing reserved stock");
            self.reservation
                .compensation()
                .compensate(
                    &staged.order.order_id,
                    &staged.order.customer_email,
                    &staged.order.items,
                )
                .await?;
            self.reopen(&staged.order).await;
            return Err(err);
        }

        let StagedOrder {
            order,
            customer,
            transaction,
        } = staged;
        let receipt = Receipt {
            customer_id: customer.customer_id.clone(),
            order_id: order.order_id,
            transaction_id: transaction.transaction_id,
            customer_email: order.customer_email,
            customer_name: customer.full_name(),
            items: order.items,
            totals: order.totals,
            billing_address: order.billing_address.to_string(),
            shipping_address: order.shipping_address.to_string(),
        };

        histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(transaction_id = %receipt.transaction_id, "checkout staged");
        Ok(CheckoutOutcome::Staged(receipt))
    }

    /// Takes the order out of `OPEN` for this request.
    async fn claim(&self, order: &Order) -> Result<()> {
        let claimed = self
            .repository
            .transition_order_status(
                &order.customer_id,
                &order.order_id,
                OrderStatus::Open,
                OrderStatus::PaymentInProgress,
            )
            .await?;
        if claimed {
            return Ok(());
        }

        counter!("checkout_conflicts_total").increment(1);
        let current = self
            .repository
            .require_order(&order.customer_id, &order.order_id)
            .await?;
        tracing::info!(status = %current.order_status, "order already claimed");
        Err(SagaError::InvalidOrderState {
            order_id: current.order_id,
            status: current.order_status,
        })
    }

    /// Returns a claimed order to `OPEN` once nothing is held for it.
    async fn reopen(&self, order: &Order) {
        let reopened = self
            .repository
            .transition_order_status(
                &order.customer_id,
                &order.order_id,
                OrderStatus::PaymentInProgress,
                OrderStatus::Open,
            )
            .await;
        match reopened {
            Ok(true) => tracing::debug!("order reopened"),
            Ok(false) => tracing::warn!("order changed while claimed, left as is"),
            Err(err) => tracing::error!(error = %err, "failed to reopen order"),
        }
    }

    /// Queues a provider status update for the payment-status processor.
    /// Unknown statuses are rejected before they reach the queue.
    #[tracing::instrument(skip(self, message), fields(order_id = %message.order_id))]
    pub async fn report_payment_status(&self, message: &PaymentStatusMessage) -> Result<String> {
        message.parse_status()?;
        let message_id = self.payments.send_json(&self.payment_queue, message).await?;
        Ok(message_id)
    }
}
