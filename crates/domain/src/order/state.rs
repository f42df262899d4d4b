//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// ```text
/// Open ──► PaymentInProgress ──┬──► Paid ──► Shipped ──► Delivered
///                              │                             │
///                              └──► PaymentFailed            ▼
///                                                    ReturnRequested ──► Returned ──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment details.
    #[default]
    Open,

    /// Stock reserved and order staged, awaiting provider confirmation.
    PaymentInProgress,

    /// Provider confirmed the charge.
    Paid,

    /// Provider rejected the charge. Reserved stock is restored.
    PaymentFailed,

    Shipped,

    Delivered,

    ReturnRequested,

    Returned,

    Refunded,
}

impl OrderStatus {
    /// Returns true if the checkout payment step may run in this status.
    pub fn can_submit_payment(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }

    /// Returns true once the order has been staged, i.e. a provider payment
    /// status may be applied to it.
    pub fn accepts_payment_updates(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }

    /// Returns true if the order can be handed to fulfillment.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::PaymentFailed | OrderStatus::Refunded)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::PaymentInProgress => "PAYMENT_IN_PROGRESS",
            OrderStatus::Paid => "PAID",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_open() {
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
    }

    #[test]
    fn test_only_open_orders_accept_payment_submission() {
        assert!(OrderStatus::Open.can_submit_payment());
        assert!(!OrderStatus::PaymentInProgress.can_submit_payment());
        assert!(!OrderStatus::Paid.can_submit_payment());
        assert!(!OrderStatus::PaymentFailed.can_submit_payment());
    }

    #[test]
    fn test_payment_updates_require_staged_order() {
        assert!(!OrderStatus::Open.accepts_payment_updates());
        assert!(OrderStatus::PaymentInProgress.accepts_payment_updates());
        assert!(OrderStatus::Paid.accepts_payment_updates());
        assert!(OrderStatus::Delivered.accepts_payment_updates());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::PaymentFailed.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Paid.can_ship());
    }

    #[test]
    fn test_wire_names_match_serde() {
        for status in [
            OrderStatus::Open,
            OrderStatus::PaymentInProgress,
            OrderStatus::Paid,
            OrderStatus::PaymentFailed,
            OrderStatus::ReturnRequested,
            OrderStatus::Refunded,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
