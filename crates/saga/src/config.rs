//! Queue names, polling parameters and saga settings.

use std::time::Duration;

use domain::DEFAULT_ORDER_TTL_MS;
use queue::{ReceiveOptions, RetryPolicy};

/// Names of the queues and the topic the saga talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub staging: String,
    pub payment_status: String,
    pub inventory_update: String,
    pub fulfillment_topic: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            staging: "staging-queue.fifo".to_string(),
            payment_status: "payment-status.fifo".to_string(),
            inventory_update: "inventory-update.fifo".to_string(),
            fulfillment_topic: "fulfillment-topic".to_string(),
        }
    }
}

/// How one queue is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub options: ReceiveOptions,
    /// Extra polls of an empty queue before reporting it as idle.
    pub empty_retries: usize,
}

impl PollSettings {
    pub fn staging() -> Self {
        Self {
            options: ReceiveOptions {
                max_messages: 10,
                visibility_timeout: Duration::from_secs(10),
                wait_time: Duration::ZERO,
            },
            empty_retries: 2,
        }
    }

    /// Small batches and a long visibility timeout: every message fans out
    /// into several store writes and a publish.
    pub fn payment_status() -> Self {
        Self {
            options: ReceiveOptions {
                max_messages: 3,
                visibility_timeout: Duration::from_secs(90),
                wait_time: Duration::from_secs(3),
            },
            empty_retries: 3,
        }
    }

    pub fn inventory_update() -> Self {
        Self {
            options: ReceiveOptions {
                max_messages: 10,
                visibility_timeout: Duration::from_secs(30),
                wait_time: Duration::ZERO,
            },
            empty_retries: 2,
        }
    }
}

/// Settings shared by the saga components.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaConfig {
    pub queues: QueueNames,
    pub staging: PollSettings,
    pub payment_status: PollSettings,
    pub inventory_update: PollSettings,
    pub order_ttl_ms: u64,
    pub sales_tax_rate: f64,
    /// Policy for staging sends, receives and deletes.
    pub retry: RetryPolicy,
    pub compensation_retries: usize,
    pub fulfillment_retries: usize,
}

impl SagaConfig {
    pub fn compensation_policy(&self) -> RetryPolicy {
        self.retry.with_max_retries(self.compensation_retries)
    }

    pub fn fulfillment_policy(&self) -> RetryPolicy {
        self.retry.with_max_retries(self.fulfillment_retries)
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            queues: QueueNames::default(),
            staging: PollSettings::staging(),
            payment_status: PollSettings::payment_status(),
            inventory_update: PollSettings::inventory_update(),
            order_ttl_ms: DEFAULT_ORDER_TTL_MS,
            sales_tax_rate: 0.0725,
            retry: RetryPolicy::default(),
            compensation_retries: 2,
            fulfillment_retries: 2,
        }
    }
}
