//! Shipping for the checkout saga.
//!
//! - [`PackingEngine`] assigns a cart to carrier parcel templates
//! - [`ShippingMethod`] prices weight-based shipping
//! - [`RateQuoteService`] is the carrier rate boundary
//! - [`ShipmentPlanner`] ties them together for a stored order

pub mod error;
pub mod method;
pub mod packing;
pub mod planner;
pub mod rates;

pub use error::{Result, ShippingError};
pub use method::{ShippingMethod, WeightUnit};
pub use packing::{DEFAULT_RESERVE, PackingEngine, pack_order};
pub use planner::ShipmentPlanner;
pub use rates::{FixedRateQuoteService, ParcelSpec, RateQuoteRequest, RateQuoteService};
