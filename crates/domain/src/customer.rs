use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::CustomerId;
use serde::{Deserialize, Serialize};

use crate::order::{Address, Money};

/// A store customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Address,
    /// Number of orders ever opened; used to number the next order.
    #[serde(default)]
    pub orders: u32,
    #[serde(default)]
    pub open_order: bool,
    #[serde(default)]
    pub purchases: u32,
    #[serde(default)]
    pub total_spent: Money,
    pub join_date: DateTime<Utc>,
    /// Order id to amount for every order whose payment was recorded.
    #[serde(default)]
    pub paid_orders: BTreeMap<String, Money>,
}

impl Customer {
    pub fn new(
        customer_id: CustomerId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        join_date: DateTime<Utc>,
    ) -> Self {
        Self {
            customer_id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            shipping_address: Address::default(),
            billing_address: Address::default(),
            orders: 0,
            open_order: false,
            purchases: 0,
            total_spent: Money::zero(),
            join_date,
            paid_orders: BTreeMap::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
