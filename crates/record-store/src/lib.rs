//! Durable keyed-record storage.
//!
//! Records are JSON documents addressed by table, partition key and an
//! optional sort key. Updates are expressed as [`UpdateExpression`]s so that
//! every backend evaluates conditions and applies field changes the same way.

pub mod error;
pub mod key;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod update;

pub use error::{Result, StoreError};
pub use key::RecordKey;
pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use store::{RecordStore, StoredRecord};
pub use update::{Condition, FieldPath, UpdateAction, UpdateExpression, UpdateRejected};
