use serde::{Deserialize, Serialize};

use crate::customer::Customer;
use crate::order::Order;
use crate::payment::Transaction;

/// The records written together once a checkout is confirmed.
///
/// Travels through the staging queue; applying it is a set of idempotent
/// upserts, so redelivery is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedOrder {
    pub order: Order,
    pub customer: Customer,
    pub transaction: Transaction,
}
