//! Orders and related types.

mod state;
mod value_objects;

use chrono::{DateTime, Duration, Utc};
use common::{CustomerId, OrderId, TransactionId};
use serde::{Deserialize, Serialize};

pub use state::OrderStatus;
pub use value_objects::{
    Address, CartLineItem, DistanceUnit, MassUnit, Money, ShippingDimensions, round_up_to_cent,
};

use crate::payment::PaymentStatus;

/// Default time an order stays payable after creation.
pub const DEFAULT_ORDER_TTL_MS: u64 = 600_000;

const OUNCES_PER_POUND: f64 = 16.0;
const OUNCES_PER_KILOGRAM: f64 = 35.274;

/// Monetary breakdown of an order. Every component is rounded up to the
/// cent before summing, so `total == subtotal + shipping + tax + fees`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderTotals {
    pub sales_subtotal: Money,
    pub shipping_cost: Money,
    pub sales_tax: Money,
    pub charges_and_fees: Money,
    pub order_total: Money,
}

impl OrderTotals {
    pub fn compute(
        items: &[CartLineItem],
        shipping_cost: Money,
        tax_rate: f64,
        charges_and_fees: Money,
    ) -> Self {
        let sales_subtotal: Money = items.iter().map(CartLineItem::subtotal).sum();
        let sales_tax = sales_subtotal.apply_rate(tax_rate);
        Self {
            sales_subtotal,
            shipping_cost,
            sales_tax,
            charges_and_fees,
            order_total: sales_subtotal + shipping_cost + sales_tax + charges_and_fees,
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub customer_email: String,
    pub transaction_id: Option<TransactionId>,
    pub items: Vec<CartLineItem>,
    pub total_items: u32,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub weight_oz: f64,
    pub weight_lb: f64,
    pub weight_kg: f64,
    /// Milliseconds after `init_time` during which payment is accepted.
    pub ttl_ms: u64,
    pub init_time: DateTime<Utc>,
    pub order_status: OrderStatus,
    /// Last provider status applied to this order.
    pub payment_status: Option<PaymentStatus>,
    /// Last provider status forwarded to fulfillment.
    pub notified_payment_status: Option<PaymentStatus>,
    pub shipping_address: Address,
    pub billing_address: Address,
}

impl Order {
    /// Builds an open order from cart contents.
    pub fn open(
        order_id: OrderId,
        customer_id: CustomerId,
        customer_email: impl Into<String>,
        items: Vec<CartLineItem>,
        totals: OrderTotals,
        ttl_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let weight_oz: f64 = items.iter().map(CartLineItem::total_weight_ounces).sum();
        let total_items = items.iter().map(|i| i.quantity).sum();

        Self {
            order_id,
            customer_id,
            customer_email: customer_email.into(),
            transaction_id: None,
            items,
            total_items,
            totals,
            weight_oz: round_up_to_cent(weight_oz),
            weight_lb: round_up_to_cent(weight_oz / OUNCES_PER_POUND),
            weight_kg: round_up_to_cent(weight_oz / OUNCES_PER_KILOGRAM),
            ttl_ms,
            init_time: now,
            order_status: OrderStatus::Open,
            payment_status: None,
            notified_payment_status: None,
            shipping_address: Address::default(),
            billing_address: Address::default(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.init_time + Duration::milliseconds(self.ttl_ms as i64)
    }

    /// Returns true once more than `ttl_ms` has elapsed since creation.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}

/// Summary returned to the customer after the payment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub customer_email: String,
    pub customer_name: String,
    pub items: Vec<CartLineItem>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub billing_address: String,
    pub shipping_address: String,
}

#[cfg(test)]
mod tests {
    use common::ItemId;

    use super::*;

    fn item(price_cents: i64, quantity: u32, weight_oz: f64) -> CartLineItem {
        CartLineItem {
            category: "apparel".to_string(),
            subcategory: "tops".to_string(),
            item_id: ItemId::new("0001"),
            size: "m".to_string(),
            name: "Tee".to_string(),
            quantity,
            unit_price: Money::from_cents(price_cents),
            dimensions: ShippingDimensions {
                length: 10.0,
                width: 8.0,
                height: 1.0,
                weight: weight_oz,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_totals_sum_rounded_components() {
        let items = vec![item(1999, 1, 4.0), item(500, 2, 2.0)];
        let totals = OrderTotals::compute(&items, Money::from_cents(800), 0.0725, Money::zero());

        assert_eq!(totals.sales_subtotal.cents(), 2999);
        // 29.99 * 0.0725 = 2.174275
        assert_eq!(totals.sales_tax.cents(), 218);
        assert_eq!(
            totals.order_total,
            totals.sales_subtotal + totals.shipping_cost + totals.sales_tax + totals.charges_and_fees
        );
        assert_eq!(totals.order_total.cents(), 2999 + 800 + 218);
    }

    #[test]
    fn test_open_order_aggregates_weights_and_counts() {
        let items = vec![item(1000, 2, 8.0), item(1000, 1, 16.0)];
        let totals = OrderTotals::compute(&items, Money::zero(), 0.0, Money::zero());
        let order = Order::open(
            OrderId::new("c-1"),
            CustomerId::new("c"),
            "c@example.com",
            items,
            totals,
            DEFAULT_ORDER_TTL_MS,
            Utc::now(),
        );

        assert_eq!(order.total_items, 3);
        assert_eq!(order.weight_oz, 32.0);
        assert_eq!(order.weight_lb, 2.0);
        assert_eq!(order.order_status, OrderStatus::Open);
    }

    #[test]
    fn test_order_expiry() {
        let created = Utc::now();
        let order = Order::open(
            OrderId::new("c-1"),
            CustomerId::new("c"),
            "c@example.com",
            vec![],
            OrderTotals::default(),
            1_000,
            created,
        );

        assert!(!order.is_expired(created + Duration::milliseconds(1_000)));
        assert!(order.is_expired(created + Duration::milliseconds(1_001)));
    }

    #[test]
    fn test_order_serialization_flattens_totals() {
        let items = vec![item(1000, 1, 1.0)];
        let totals = OrderTotals::compute(&items, Money::zero(), 0.0, Money::zero());
        let order = Order::open(
            OrderId::new("c-1"),
            CustomerId::new("c"),
            "c@example.com",
            items,
            totals,
            DEFAULT_ORDER_TTL_MS,
            Utc::now(),
        );

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["order_status"], "OPEN");
        assert_eq!(json["order_total"]["cents"], 1000);

        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
