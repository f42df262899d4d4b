//! Shipping error types.

use domain::DomainError;
use thiserror::Error;

use crate::method::WeightUnit;

/// Errors that can occur while pricing, packing or planning a shipment.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// No parcel template can hold the bulkiest remaining item. Needs a
    /// catalog change, so it is never retried.
    #[error("No parcels found for {remaining} remaining unit(s)")]
    NoParcelsFound { remaining: u32 },

    /// A shipping method was asked to price a weight in the wrong unit.
    #[error("Invalid weight unit: method rates per {expected}, got {actual}")]
    InvalidWeightUnit {
        expected: WeightUnit,
        actual: WeightUnit,
    },

    /// A unit code outside the supported set.
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    /// The carrier rate-quote service failed.
    #[error("Rate quote failed: {0}")]
    RateQuote(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl ShippingError {
    pub fn is_transient(&self) -> bool {
        match self {
            ShippingError::RateQuote(_) => true,
            ShippingError::Domain(err) => err.is_transient(),
            ShippingError::NoParcelsFound { .. }
            | ShippingError::InvalidWeightUnit { .. }
            | ShippingError::InvalidUnit(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShippingError>;
