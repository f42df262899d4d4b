//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use queue::RetryPolicy;
use saga::SagaConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` - bind address (default: `"0.0.0.0"`)
/// - `PORT` - listen port (default: `3000`)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` - PostgreSQL record store; in-memory when unset
/// - `ORDER_TTL_MS` - payable window of an open order (default: `600000`)
/// - `SALES_TAX_RATE` - default: `0.0725`
/// - `QUEUE_MAX_RETRIES` - retries per queue call (default: `4`)
/// - `QUEUE_BASE_DELAY_MS` - first backoff delay (default: `1000`)
/// - `POLL_INTERVAL_MS` - queue worker cadence, `0` disables them (default: `5000`)
/// - `SHIPPING_CARRIER` - parcel catalog used for planning (default: `"USPS"`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub order_ttl_ms: u64,
    pub sales_tax_rate: f64,
    pub queue_max_retries: usize,
    pub queue_base_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub shipping_carrier: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unparseable values
    /// fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| Parsed(lookup(key));

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            order_ttl_ms: parsed("ORDER_TTL_MS").or(defaults.order_ttl_ms),
            sales_tax_rate: parsed("SALES_TAX_RATE").or(defaults.sales_tax_rate),
            queue_max_retries: parsed("QUEUE_MAX_RETRIES").or(defaults.queue_max_retries),
            queue_base_delay_ms: parsed("QUEUE_BASE_DELAY_MS")
                .or(defaults.queue_base_delay_ms),
            poll_interval_ms: parsed("POLL_INTERVAL_MS").or(defaults.poll_interval_ms),
            shipping_carrier: lookup("SHIPPING_CARRIER").unwrap_or(defaults.shipping_carrier),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            order_ttl_ms: self.order_ttl_ms,
            sales_tax_rate: self.sales_tax_rate,
            retry: RetryPolicy::new(
                self.queue_max_retries,
                Duration::from_millis(self.queue_base_delay_ms),
            ),
            ..SagaConfig::default()
        }
    }

    /// Worker cadence, or `None` when the workers are disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }
}

/// A raw variable that parses on demand into whatever type the field needs.
struct Parsed(Option<String>);

impl Parsed {
    fn or<T: FromStr>(self, default: T) -> T {
        self.0.and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            order_ttl_ms: 600_000,
            sales_tax_rate: 0.0725,
            queue_max_retries: 4,
            queue_base_delay_ms: 1000,
            poll_interval_ms: 5000,
            shipping_carrier: "USPS".to_string(),
        }
    }
}
