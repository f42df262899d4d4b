use std::collections::BTreeMap;

use common::{ItemId, OrderId};
use serde::{Deserialize, Serialize};

use crate::order::{CartLineItem, Money};

/// A catalog item with stock counts per size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub item_id: ItemId,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub price: Money,
    /// Size key (lowercase) to units on hand.
    pub units_available: BTreeMap<String, i64>,
    #[serde(default)]
    pub units_sold: i64,
    /// Adjustment entries already restored into this item's stock.
    #[serde(default)]
    pub applied_adjustments: BTreeMap<String, bool>,
}

/// Instruction to restore stock for the listed items.
///
/// Directionless: consumers add each item's quantity back to
/// `units_available[size]`. `adjustment_id` makes the restore idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub adjustment_id: String,
    pub customer_email: String,
    pub order_id: OrderId,
    pub items: Vec<CartLineItem>,
}

impl InventoryAdjustment {
    pub fn new(
        adjustment_id: impl Into<String>,
        order_id: OrderId,
        customer_email: impl Into<String>,
        items: Vec<CartLineItem>,
    ) -> Self {
        Self {
            adjustment_id: adjustment_id.into(),
            customer_email: customer_email.into(),
            order_id,
            items,
        }
    }

    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
