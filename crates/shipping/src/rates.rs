//! Carrier rate-quote boundary.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Address, DistanceUnit, MassUnit, Package, RateSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, ShippingError};

/// One parcel as the rate service sees it: outer dimensions, packed weight
/// and the carrier template code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelSpec {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub distance_unit: DistanceUnit,
    pub weight: f64,
    pub mass_unit: MassUnit,
    pub template: String,
}

impl From<&Package> for ParcelSpec {
    fn from(package: &Package) -> Self {
        let dims = &package.dimensions;
        Self {
            length: dims.length,
            width: dims.width,
            height: dims.height,
            distance_unit: dims.distance_unit,
            weight: package.weight_oz,
            mass_unit: MassUnit::Oz,
            template: package.template.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuoteRequest {
    pub address_from: Address,
    pub address_to: Address,
    pub parcels: Vec<ParcelSpec>,
}

impl RateQuoteRequest {
    pub fn for_packages(address_from: Address, address_to: Address, packages: &[Package]) -> Self {
        Self {
            address_from,
            address_to,
            parcels: packages.iter().map(ParcelSpec::from).collect(),
        }
    }
}

/// Quotes shipping rates. Results are passed through untouched.
#[async_trait]
pub trait RateQuoteService: Send + Sync {
    async fn quote(&self, request: &RateQuoteRequest) -> Result<Vec<RateSummary>>;
}

#[derive(Debug, Default)]
struct FixedRateState {
    requests: Vec<RateQuoteRequest>,
    fail_on_quote: bool,
}

/// Rate service returning a fixed list of rates. Records every request.
#[derive(Debug, Clone, Default)]
pub struct FixedRateQuoteService {
    rates: Vec<RateSummary>,
    state: Arc<Mutex<FixedRateState>>,
}

impl FixedRateQuoteService {
    pub fn new(rates: Vec<RateSummary>) -> Self {
        Self {
            rates,
            state: Arc::default(),
        }
    }

    /// Makes the next quotes fail until reset.
    pub async fn set_fail_on_quote(&self, fail: bool) {
        self.state.lock().await.fail_on_quote = fail;
    }

    pub async fn requests(&self) -> Vec<RateQuoteRequest> {
        self.state.lock().await.requests.clone()
    }
}

#[async_trait]
impl RateQuoteService for FixedRateQuoteService {
    async fn quote(&self, request: &RateQuoteRequest) -> Result<Vec<RateSummary>> {
        let mut state = self.state.lock().await;
        if state.fail_on_quote {
            return Err(ShippingError::RateQuote("rate service unavailable".to_string()));
        }
        state.requests.push(request.clone());
        Ok(self.rates.clone())
    }
}
