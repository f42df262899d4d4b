use std::time::Duration;

/// A message ready to be sent to a FIFO queue or topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    /// Sends with the same id inside the dedup window are dropped.
    pub deduplication_id: String,
    /// Ordering is preserved within a group.
    pub group_id: String,
}

/// A message handed out by a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    /// Handle for this particular receipt; needed to delete or release.
    pub receipt_handle: String,
    pub body: String,
    pub receive_count: u32,
}

impl ReceivedMessage {
    pub fn entry(&self) -> BatchEntry {
        BatchEntry {
            id: self.message_id.clone(),
            receipt_handle: self.receipt_handle.clone(),
        }
    }
}

/// Parameters for a receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: usize,
    /// How long received messages stay hidden from other consumers. Must
    /// exceed the slowest expected processing time for a whole batch.
    pub visibility_timeout: Duration,
    /// Long-poll wait when the queue is empty.
    pub wait_time: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            visibility_timeout: Duration::from_secs(30),
            wait_time: Duration::ZERO,
        }
    }
}

/// One entry of a delete or change-visibility batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    pub receipt_handle: String,
}

/// A batch entry the transport could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: String,
    pub code: String,
}

/// Per-entry result of a batch call. Empty `failed` means full success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A successfully decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered<M> {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: M,
}

impl<M> Delivered<M> {
    pub fn entry(&self) -> BatchEntry {
        BatchEntry {
            id: self.message_id.clone(),
            receipt_handle: self.receipt_handle.clone(),
        }
    }
}

/// Result of a decoding receive: good messages plus the entries of
/// malformed ones, which callers drop by including them in their delete.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedBatch<M> {
    pub delivered: Vec<Delivered<M>>,
    pub malformed: Vec<BatchEntry>,
}

impl<M> Default for ReceivedBatch<M> {
    fn default() -> Self {
        Self {
            delivered: Vec::new(),
            malformed: Vec::new(),
        }
    }
}

impl<M> ReceivedBatch<M> {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.malformed.is_empty()
    }

    /// Entries to acknowledge once every delivered message has been applied.
    pub fn ack_entries(&self) -> Vec<BatchEntry> {
        self.delivered
            .iter()
            .map(Delivered::entry)
            .chain(self.malformed.iter().cloned())
            .collect()
    }
}
