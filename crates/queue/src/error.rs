use thiserror::Error;

/// Errors surfaced by queue and topic operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Network or service fault. Safe to retry.
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// The service rejected the request due to rate limiting. Safe to retry.
    #[error("Queue request throttled: {0}")]
    Throttled(String),

    /// The named queue or topic does not exist.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Some batch entries still failed after the retry budget was spent.
    #[error("{operation} batch incomplete: {failed} entries failed after retries")]
    BatchIncomplete {
        operation: &'static str,
        failed: usize,
    },

    /// A message body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Transport(_) | QueueError::Throttled(_) => true,
            QueueError::QueueNotFound(_)
            | QueueError::BatchIncomplete { .. }
            | QueueError::Serialization(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
