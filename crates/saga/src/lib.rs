//! Order checkout saga.
//!
//! A checkout reserves stock, then stages the order through a FIFO queue;
//! provider payment statuses arrive on a second queue and are applied to the
//! staged records. Every step that cannot complete gives reserved stock back
//! through inventory adjustments on a third queue.
//!
//! ```text
//! submit_payment ──► reserve_stock ──► stage ──► [staging queue] ──► drain_staged
//!                        │                                               │
//!                        ▼                                               ▼
//!                 [inventory-update] ◄── PAYMENT_FAIL ── process_payment_statuses ──► [fulfillment topic]
//!                        │
//!                        ▼
//!                  apply_pending
//! ```
//!
//! Queue consumers apply first and delete after, so each apply is an
//! idempotent upsert or guarded by a marker in the store.

pub mod checkout;
pub mod compensation;
pub mod components;
pub mod config;
pub mod drain;
pub mod error;
pub mod inventory;
pub mod payment_status;
pub mod staging;

pub use checkout::{CheckoutCoordinator, CheckoutOutcome, PaymentRequest};
pub use compensation::{CompensationEmitter, InventoryAdjustmentApplier};
pub use components::SagaComponents;
pub use config::{PollSettings, QueueNames, SagaConfig};
pub use drain::DrainReport;
pub use error::{ErrorKind, Result, SagaError};
pub use inventory::{InventoryReservationService, ReservationOutcome, StockCheck};
pub use payment_status::PaymentStatusProcessor;
pub use staging::OrderStagingCoordinator;
