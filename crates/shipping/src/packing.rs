//! Parcel selection and greedy multi-parcel splitting.
//!
//! A cart is first matched against the catalog as a whole: the smallest
//! template whose volume covers the cart plus a packing-material reserve, and
//! whose length, width and height each cover the largest item, wins. When no
//! single template is big enough the cart is split by repeatedly filling the
//! largest template, bulkiest units first, and re-fitting each filled subset
//! to the smallest template that holds it.

use domain::{CartLineItem, Package, PackedItem, ParcelTemplate, round_up_to_cent};

use crate::error::{Result, ShippingError};

/// Fraction of extra volume kept free for packing material.
pub const DEFAULT_RESERVE: f64 = 0.2;

/// Aggregate size of a set of line items.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Requirements {
    volume: f64,
    weight_oz: f64,
    /// Largest single-unit length, width and height, in inches.
    max_dims: [f64; 3],
}

impl Requirements {
    fn of(items: &[CartLineItem]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            acc.volume += item.total_volume();
            acc.weight_oz += item.total_weight_ounces();
            for (max, dim) in acc.max_dims.iter_mut().zip(item.dimensions.inches()) {
                *max = (*max).max(dim);
            }
            acc
        })
    }
}

/// True if `inner` fits inside `outer` axis by axis.
fn fits_within(inner: [f64; 3], outer: [f64; 3]) -> bool {
    inner.iter().zip(outer).all(|(i, o)| *i <= o)
}

fn total_units(items: &[CartLineItem]) -> u32 {
    items.iter().map(|i| i.quantity).sum()
}

/// Catalog ordered smallest volume first. Equal volumes keep catalog order.
fn by_volume(catalog: &[ParcelTemplate]) -> Vec<&ParcelTemplate> {
    let mut sorted: Vec<_> = catalog.iter().collect();
    sorted.sort_by(|a, b| a.volume().total_cmp(&b.volume()));
    sorted
}

fn build_package(template: &ParcelTemplate, items: &[CartLineItem], req: &Requirements) -> Package {
    Package {
        carrier: template.carrier.clone(),
        parcel_id: template.parcel_id.clone(),
        name: template.name.clone(),
        template: template.template.clone(),
        dimensions: template.dimensions.clone(),
        items: items.iter().map(PackedItem::from).collect(),
        packed_volume: req.volume,
        leftover_volume: template.volume() - req.volume,
        weight_oz: round_up_to_cent(req.weight_oz),
        tracking_number: None,
    }
}

/// Packs carts into carrier parcel templates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackingEngine {
    reserve: f64,
}

impl Default for PackingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVE)
    }
}

impl PackingEngine {
    /// Creates an engine that keeps `reserve` (e.g. `0.2` for 20%) of extra
    /// volume free in every parcel.
    pub fn new(reserve: f64) -> Self {
        Self {
            reserve: reserve.max(0.0),
        }
    }

    pub fn reserve(&self) -> f64 {
        self.reserve
    }

    /// Smallest template that holds every item in `items`, if any.
    pub fn best_fit<'a>(
        &self,
        items: &[CartLineItem],
        catalog: &'a [ParcelTemplate],
    ) -> Option<&'a ParcelTemplate> {
        self.select(&Requirements::of(items), &by_volume(catalog))
    }

    fn select<'a>(
        &self,
        req: &Requirements,
        sorted: &[&'a ParcelTemplate],
    ) -> Option<&'a ParcelTemplate> {
        sorted.iter().copied().find(|template| {
            template.volume() >= req.volume * (1.0 + self.reserve)
                && fits_within(req.max_dims, template.dimensions.inches())
        })
    }

    /// Assigns every unit in `items` to a package.
    ///
    /// Quantities across the returned packages add up to the input
    /// quantities. Zero-quantity lines are ignored and an empty cart yields
    /// no packages. Fails with [`ShippingError::NoParcelsFound`] when a pass
    /// packs nothing, which happens when the catalog has no template able to
    /// hold the bulkiest remaining unit.
    #[tracing::instrument(skip_all, fields(lines = items.len(), templates = catalog.len()))]
    pub fn pack_order(
        &self,
        items: &[CartLineItem],
        catalog: &[ParcelTemplate],
    ) -> Result<Vec<Package>> {
        let mut remaining: Vec<CartLineItem> =
            items.iter().filter(|i| i.quantity > 0).cloned().collect();
        let mut packages = Vec::new();
        if remaining.is_empty() {
            return Ok(packages);
        }

        let sorted = by_volume(catalog);
        let Some(largest) = sorted.last().copied() else {
            return Err(ShippingError::NoParcelsFound {
                remaining: total_units(&remaining),
            });
        };

        loop {
            let req = Requirements::of(&remaining);
            if let Some(template) = self.select(&req, &sorted) {
                packages.push(build_package(template, &remaining, &req));
                return Ok(packages);
            }

            let (packed, rest) = self.fill(largest, remaining);
            if packed.is_empty() {
                let remaining = total_units(&rest);
                tracing::warn!(remaining, "no parcel template fits the remaining items");
                return Err(ShippingError::NoParcelsFound { remaining });
            }

            // The fill never exceeds the largest template's usable capacity,
            // so it is a valid fallback when rounding defeats `select`.
            let packed_req = Requirements::of(&packed);
            let template = self.select(&packed_req, &sorted).unwrap_or(largest);
            tracing::debug!(
                parcel = %template.parcel_id,
                units = total_units(&packed),
                "filled parcel"
            );
            packages.push(build_package(template, &packed, &packed_req));

            remaining = rest;
            if remaining.is_empty() {
                return Ok(packages);
            }
        }
    }

    /// Greedily fills `template`. Returns the packed lines and whatever is
    /// left over, including split remainders.
    fn fill(
        &self,
        template: &ParcelTemplate,
        mut items: Vec<CartLineItem>,
    ) -> (Vec<CartLineItem>, Vec<CartLineItem>) {
        let inner = template.dimensions.inches();
        let mut capacity = template.volume() / (1.0 + self.reserve);
        let mut packed = Vec::new();
        let mut rest = Vec::new();

        items.sort_by(|a, b| b.unit_volume().total_cmp(&a.unit_volume()));

        for item in items {
            if !fits_within(item.dimensions.inches(), inner) {
                rest.push(item);
                continue;
            }

            let line_volume = item.total_volume();
            if line_volume <= capacity {
                capacity -= line_volume;
                packed.push(item);
                continue;
            }

            let unit_volume = item.unit_volume();
            let mut taken = 0;
            while taken < item.quantity && unit_volume <= capacity {
                capacity -= unit_volume;
                taken += 1;
            }
            if taken > 0 {
                packed.push(item.with_quantity(taken));
            }
            if taken < item.quantity {
                rest.push(item.with_quantity(item.quantity - taken));
            }
        }

        (packed, rest)
    }
}

/// Packs `items` with the default reserve.
pub fn pack_order(items: &[CartLineItem], catalog: &[ParcelTemplate]) -> Result<Vec<Package>> {
    PackingEngine::default().pack_order(items, catalog)
}
