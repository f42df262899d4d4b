//! Shared bookkeeping for queue consumers.

use std::time::Duration;

use queue::{BatchEntry, QueueClient, QueueTransport, ReceivedBatch};
use serde::Serialize;

use crate::error::{Result, SagaError};

/// What one drain of a queue did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Distinct messages received, malformed ones included.
    pub received: usize,
    pub applied: usize,
    /// Messages whose effect was already recorded.
    pub duplicates: usize,
    /// Undecodable messages that were dropped.
    pub malformed: usize,
}

impl DrainReport {
    pub(crate) fn for_batch<M>(batch: &ReceivedBatch<M>) -> Self {
        Self {
            received: batch.delivered.len() + batch.malformed.len(),
            malformed: batch.malformed.len(),
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.received == 0
    }
}

/// Deletes applied messages. Failure here means the effects are in place
/// but the messages will come back.
pub(crate) async fn acknowledge<T: QueueTransport>(
    client: &QueueClient<T>,
    queue: &str,
    entries: Vec<BatchEntry>,
) -> Result<()> {
    client
        .delete_batch(queue, entries)
        .await
        .map_err(|source| SagaError::AckFailed {
            queue: queue.to_string(),
            source,
        })
}

/// Makes the batch visible again after an aborted apply. Best effort: if it
/// fails the messages reappear once their visibility timeout runs out.
pub(crate) async fn release<T: QueueTransport>(
    client: &QueueClient<T>,
    queue: &str,
    entries: Vec<BatchEntry>,
) {
    if entries.is_empty() {
        return;
    }
    if let Err(err) = client
        .change_visibility_batch(queue, entries, Duration::ZERO)
        .await
    {
        tracing::warn!(queue, error = %err, "failed to release messages");
    }
}
