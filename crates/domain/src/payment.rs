//! Payment statuses, provider status messages and transactions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::order::{Order, OrderStatus, OrderTotals};

/// Status codes reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    InProgress,
    PaymentSuccess,
    PaymentFail,
    RefundSuccess,
    RefundFail,
    Disputed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::InProgress,
        PaymentStatus::PaymentSuccess,
        PaymentStatus::PaymentFail,
        PaymentStatus::RefundSuccess,
        PaymentStatus::RefundFail,
        PaymentStatus::Disputed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::InProgress => "IN_PROGRESS",
            PaymentStatus::PaymentSuccess => "PAYMENT_SUCCESS",
            PaymentStatus::PaymentFail => "PAYMENT_FAIL",
            PaymentStatus::RefundSuccess => "REFUND_SUCCESS",
            PaymentStatus::RefundFail => "REFUND_FAIL",
            PaymentStatus::Disputed => "DISPUTED",
        }
    }

    /// The order status this payment status moves the order to, if any.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            PaymentStatus::InProgress => Some(OrderStatus::PaymentInProgress),
            PaymentStatus::PaymentSuccess => Some(OrderStatus::Paid),
            PaymentStatus::PaymentFail => Some(OrderStatus::PaymentFailed),
            PaymentStatus::RefundSuccess => Some(OrderStatus::Refunded),
            PaymentStatus::RefundFail | PaymentStatus::Disputed => None,
        }
    }

    /// Provider statuses an order may hold when this one arrives. `None`
    /// stands for an order no status was applied to yet.
    ///
    /// A charge settles once: after `PAYMENT_SUCCESS` only refunds and
    /// disputes apply, and nothing follows `PAYMENT_FAIL` or
    /// `REFUND_SUCCESS`.
    pub fn predecessors(&self) -> &'static [Option<PaymentStatus>] {
        match self {
            PaymentStatus::InProgress => &[None],
            PaymentStatus::PaymentSuccess | PaymentStatus::PaymentFail => {
                &[None, Some(PaymentStatus::InProgress)]
            }
            PaymentStatus::RefundSuccess => &[
                Some(PaymentStatus::PaymentSuccess),
                Some(PaymentStatus::RefundFail),
                Some(PaymentStatus::Disputed),
            ],
            PaymentStatus::RefundFail | PaymentStatus::Disputed => &[
                Some(PaymentStatus::PaymentSuccess),
                Some(PaymentStatus::RefundFail),
                Some(PaymentStatus::Disputed),
            ],
        }
    }

    /// Returns true if this status may replace `previous` on an order.
    pub fn can_follow(&self, previous: Option<PaymentStatus>) -> bool {
        self.predecessors().contains(&previous)
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidPaymentStatus(s.to_string()))
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider status update for a staged order, as received on the
/// payment-status queue.
///
/// `status` stays a raw string so that an unknown value can be detected and
/// rejected explicitly instead of failing message decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusMessage {
    pub customer_email: String,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub payment_method: String,
    pub provider_tx_id: String,
    pub status: String,
    #[serde(default)]
    pub status_message: String,
}

impl PaymentStatusMessage {
    /// Validates `status` against the fixed set of provider codes.
    pub fn parse_status(&self) -> Result<PaymentStatus, DomainError> {
        self.status.parse()
    }
}

/// A monetary transaction between the store and a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub provider_tx_id: Option<String>,
}

impl Transaction {
    /// Creates an in-progress transaction for `order`. The id is a content
    /// hash of customer, order and timestamp, so every attempt is distinct.
    pub fn begin(order: &Order, timestamp: DateTime<Utc>) -> Self {
        let id = common::content_hash(format!(
            "{}:{}:{}",
            order.customer_id,
            order.order_id,
            timestamp.to_rfc3339()
        ));

        Self {
            transaction_id: TransactionId::new(id),
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            timestamp,
            totals: order.totals,
            payment_status: PaymentStatus::InProgress,
            payment_method: None,
            provider_tx_id: None,
        }
    }
}
