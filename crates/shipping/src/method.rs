//! Weight-based shipping methods.

use std::str::FromStr;

use domain::{Money, Order};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShippingError};

/// Unit a shipping rate is quoted per.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeightUnit {
    Oz,
    Lb,
    Kg,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Oz => "OZ",
            WeightUnit::Lb => "LB",
            WeightUnit::Kg => "KG",
        }
    }
}

impl FromStr for WeightUnit {
    type Err = ShippingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OZ" => Ok(WeightUnit::Oz),
            "LB" | "LBS" => Ok(WeightUnit::Lb),
            "KG" => Ok(WeightUnit::Kg),
            _ => Err(ShippingError::InvalidUnit(s.to_string())),
        }
    }
}

impl std::fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A flat per-weight shipping rate, e.g. $0.35 per ounce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub method_id: String,
    pub name: String,
    /// Dollars per `rate_weight_unit`.
    pub rate_usd: f64,
    pub rate_weight_unit: WeightUnit,
}

impl ShippingMethod {
    pub fn new(
        method_id: impl Into<String>,
        name: impl Into<String>,
        rate_usd: f64,
        rate_weight_unit: WeightUnit,
    ) -> Self {
        Self {
            method_id: method_id.into(),
            name: name.into(),
            rate_usd,
            rate_weight_unit,
        }
    }

    /// `rate × weight`, rounded up to the cent. The weight must be expressed
    /// in the unit the rate is quoted per.
    pub fn price_for(&self, weight: f64, unit: WeightUnit) -> Result<Money> {
        if unit != self.rate_weight_unit {
            tracing::warn!(
                method = %self.method_id,
                expected = %self.rate_weight_unit,
                actual = %unit,
                "shipping method priced with wrong weight unit"
            );
            return Err(ShippingError::InvalidWeightUnit {
                expected: self.rate_weight_unit,
                actual: unit,
            });
        }
        Ok(Money::from_dollars_ceil(self.rate_usd * weight))
    }

    /// Prices an order using its aggregate weight in this method's unit.
    pub fn price_for_order(&self, order: &Order) -> Result<Money> {
        let weight = match self.rate_weight_unit {
            WeightUnit::Oz => order.weight_oz,
            WeightUnit::Lb => order.weight_lb,
            WeightUnit::Kg => order.weight_kg,
        };
        self.price_for(weight, self.rate_weight_unit)
    }
}
