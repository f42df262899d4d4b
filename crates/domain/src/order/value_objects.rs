//! Value objects for the order domain.

use common::ItemId;
use serde::{Deserialize, Serialize};

/// Absorbs binary floating point noise such as `0.07 * 100 = 7.000000000000001`
/// before rounding up. Applies only just above a non-zero whole cent count.
const CENT_EPSILON: f64 = 1e-9;

/// Rounds `x` up to the nearest hundredth.
///
/// `round_up_to_cent(1.2444) == 1.25`, `round_up_to_cent(1.0) == 1.0`,
/// `round_up_to_cent(1e-12) == 0.01`.
pub fn round_up_to_cent(x: f64) -> f64 {
    ceil_hundredths(x) as f64 / 100.0
}

fn ceil_hundredths(x: f64) -> i64 {
    let scaled = x * 100.0;
    let floor = scaled.floor();
    if floor >= 1.0 && scaled - floor < CENT_EPSILON {
        floor as i64
    } else {
        scaled.ceil() as i64
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from fractional dollars, rounding up to the
    /// next cent.
    pub fn from_dollars_ceil(dollars: f64) -> Self {
        Self {
            cents: ceil_hundredths(dollars),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn as_dollars(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Applies a rate (e.g. a tax rate), rounding the result up to the cent.
    pub fn apply_rate(&self, rate: f64) -> Money {
        Money::from_dollars_ceil(self.as_dollars() * rate)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Length unit of a shipping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    In,
    Cm,
}

impl DistanceUnit {
    pub fn to_inches(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::In => value,
            DistanceUnit::Cm => value / 2.54,
        }
    }
}

/// Mass unit of a shipping weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    #[default]
    Oz,
    Lb,
    Kg,
    G,
}

impl MassUnit {
    pub fn to_ounces(&self, value: f64) -> f64 {
        match self {
            MassUnit::Oz => value,
            MassUnit::Lb => value * 16.0,
            MassUnit::Kg => value * 35.274,
            MassUnit::G => value * 0.035274,
        }
    }
}

/// Shipping dimensions of a single unit of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShippingDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    pub weight: f64,
    #[serde(default)]
    pub mass_unit: MassUnit,
    /// Precomputed unit volume in `distance_unit`³. Zero means "derive it".
    #[serde(default)]
    pub volume: f64,
}

impl ShippingDimensions {
    /// Length, width and height in inches.
    pub fn inches(&self) -> [f64; 3] {
        [
            self.distance_unit.to_inches(self.length),
            self.distance_unit.to_inches(self.width),
            self.distance_unit.to_inches(self.height),
        ]
    }

    /// Unit volume in cubic inches.
    pub fn volume_cubic_inches(&self) -> f64 {
        if self.volume > 0.0 {
            let factor = self.distance_unit.to_inches(1.0);
            self.volume * factor * factor * factor
        } else {
            let [l, w, h] = self.inches();
            l * w * h
        }
    }

    pub fn weight_ounces(&self) -> f64 {
        self.mass_unit.to_ounces(self.weight)
    }
}

/// A product variant in a customer's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub category: String,
    pub subcategory: String,
    pub item_id: ItemId,
    pub size: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub dimensions: ShippingDimensions,
}

impl CartLineItem {
    /// Key into the store item's `units_available` map.
    pub fn size_key(&self) -> String {
        self.size.to_lowercase()
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    pub fn unit_volume(&self) -> f64 {
        self.dimensions.volume_cubic_inches()
    }

    /// Volume of the whole line, scaled by quantity.
    pub fn total_volume(&self) -> f64 {
        self.unit_volume() * self.quantity as f64
    }

    pub fn total_weight_ounces(&self) -> f64 {
        self.dimensions.weight_ounces() * self.quantity as f64
    }

    /// Returns a copy of this line with a different quantity.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

/// A mailing or billing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
    #[serde(default)]
    pub phone_number: String,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address_line_1)?;
        if !self.address_line_2.is_empty() {
            write!(f, " {}", self.address_line_2)?;
        }
        write!(f, ", {}, {} {}", self.city, self.state, self.zip)
    }
}
