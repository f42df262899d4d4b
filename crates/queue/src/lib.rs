//! Durable queue client.
//!
//! [`QueueClient`] and [`TopicClient`] wrap a transport with a bounded
//! exponential-backoff retry policy. Sends are deduplicated by a hash of the
//! serialized message, receives skip malformed payloads, and batch
//! acknowledgements retry only the entries the transport reported as failed.

pub mod client;
pub mod error;
pub mod memory;
pub mod message;
pub mod retry;
pub mod transport;

pub use client::{QueueClient, TopicClient};
pub use error::{QueueError, Result};
pub use memory::{InMemoryQueueTransport, InMemoryTopic, PublishedMessage};
pub use message::{
    BatchEntry, BatchFailure, BatchOutcome, Delivered, OutgoingMessage, ReceiveOptions,
    ReceivedBatch, ReceivedMessage,
};
pub use retry::RetryPolicy;
pub use transport::{QueueTransport, TopicTransport};
