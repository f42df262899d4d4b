pub mod hash;
pub mod types;

pub use hash::{content_hash, json_content_hash};
pub use types::{CustomerId, ItemId, OrderId, TransactionId};
