//! Shipment planning for staged orders.

use common::{CustomerId, OrderId};
use domain::{Address, Repository, Shipment};
use metrics::counter;
use record_store::RecordStore;

use crate::error::Result;
use crate::packing::PackingEngine;
use crate::rates::{RateQuoteRequest, RateQuoteService};

/// Packs an order into the carrier's parcels, quotes rates and stores the
/// resulting [`Shipment`].
pub struct ShipmentPlanner<S, R> {
    repository: Repository<S>,
    rates: R,
    engine: PackingEngine,
    carrier: String,
    address_from: Address,
}

impl<S: RecordStore, R: RateQuoteService> ShipmentPlanner<S, R> {
    pub fn new(
        repository: Repository<S>,
        rates: R,
        carrier: impl Into<String>,
        address_from: Address,
    ) -> Self {
        Self {
            repository,
            rates,
            engine: PackingEngine::default(),
            carrier: carrier.into(),
            address_from,
        }
    }

    pub fn with_engine(mut self, engine: PackingEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn rates(&self) -> &R {
        &self.rates
    }

    /// Plans and persists the shipment for one order. Planning again
    /// overwrites the previous plan.
    #[tracing::instrument(skip(self))]
    pub async fn plan(&self, customer_id: &CustomerId, order_id: &OrderId) -> Result<Shipment> {
        let order = self.repository.require_order(customer_id, order_id).await?;
        let catalog = self.repository.parcels(&self.carrier).await?;

        let packages = self.engine.pack_order(&order.items, &catalog)?;
        let request = RateQuoteRequest::for_packages(
            self.address_from.clone(),
            order.shipping_address.clone(),
            &packages,
        );
        let rates = self.rates.quote(&request).await?;

        let shipment = Shipment {
            customer_id: order.customer_id,
            order_id: order.order_id,
            address_to: order.shipping_address,
            address_from: self.address_from.clone(),
            packages,
            rates,
        };
        self.repository.put_shipment(&shipment).await?;

        counter!("packages_planned_total").increment(shipment.packages.len() as u64);
        tracing::info!(
            packages = shipment.packages.len(),
            rates = shipment.rates.len(),
            "shipment planned"
        );

        Ok(shipment)
    }
}
