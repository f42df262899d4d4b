//! Shipping reference data and packing results.

use common::{CustomerId, ItemId, OrderId};
use serde::{Deserialize, Serialize};

use crate::order::{Address, CartLineItem, DistanceUnit, MassUnit, Money};

/// Outer dimensions and weight limit of a parcel template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParcelDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    pub max_weight: f64,
    #[serde(default)]
    pub mass_unit: MassUnit,
}

impl ParcelDimensions {
    /// Length, width and height in inches.
    pub fn inches(&self) -> [f64; 3] {
        [
            self.distance_unit.to_inches(self.length),
            self.distance_unit.to_inches(self.width),
            self.distance_unit.to_inches(self.height),
        ]
    }

    pub fn volume_cubic_inches(&self) -> f64 {
        let [l, w, h] = self.inches();
        l * w * h
    }
}

/// A carrier-defined box. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelTemplate {
    pub carrier: String,
    pub parcel_id: String,
    pub name: String,
    /// Carrier template code, e.g. `USPS_MediumFlatRateBox1`.
    pub template: String,
    pub dimensions: ParcelDimensions,
    pub unit_price: Money,
    pub units_available: u32,
}

impl ParcelTemplate {
    pub fn volume(&self) -> f64 {
        self.dimensions.volume_cubic_inches()
    }
}

/// Quantity of one cart line placed in a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedItem {
    pub subcategory: String,
    pub item_id: ItemId,
    pub size: String,
    pub name: String,
    pub quantity: u32,
}

impl From<&CartLineItem> for PackedItem {
    fn from(item: &CartLineItem) -> Self {
        Self {
            subcategory: item.subcategory.clone(),
            item_id: item.item_id.clone(),
            size: item.size.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
        }
    }
}

/// A parcel template filled with a subset of an order's items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub carrier: String,
    pub parcel_id: String,
    pub name: String,
    pub template: String,
    pub dimensions: ParcelDimensions,
    pub items: Vec<PackedItem>,
    /// Cubic inches occupied by the packed items.
    pub packed_volume: f64,
    /// Template volume minus packed volume.
    pub leftover_volume: f64,
    pub weight_oz: f64,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl Package {
    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLevel {
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub terms: String,
}

/// A carrier's quote for shipping a set of parcels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    pub price: Money,
    pub currency: String,
    pub provider: String,
    pub days: Option<u32>,
    pub service_level: ServiceLevel,
}

/// Planned shipment for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub address_to: Address,
    pub address_from: Address,
    pub packages: Vec<Package>,
    pub rates: Vec<RateSummary>,
}
