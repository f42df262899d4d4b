//! In-memory FIFO queue and topic transports.
//!
//! Model the semantics the orchestration code relies on: per-group ordering,
//! content deduplication inside a window, visibility timeouts and receipt
//! handles. Fault toggles let tests exercise the retry paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    BatchEntry, BatchFailure, BatchOutcome, OutgoingMessage, QueueError, QueueTransport,
    ReceiveOptions, ReceivedMessage, Result, TopicTransport,
};

const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    group_id: String,
    body: String,
    receive_count: u32,
    receipt_handle: Option<String>,
    visible_at: Instant,
}

impl StoredMessage {
    fn in_flight(&self, now: Instant) -> bool {
        self.receipt_handle.is_some() && self.visible_at > now
    }
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    dedup: HashMap<String, (Instant, String)>,
    accepted_sends: usize,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    queues: HashMap<String, QueueState>,
    fail_sends: usize,
    fail_receives: usize,
    fail_deletes: usize,
}

/// In-memory FIFO queue service.
///
/// Queues must be created with [`create_queue`](Self::create_queue) or
/// [`with_queues`](Self::with_queues); calls against unknown names fail with
/// `QueueNotFound`. Receives return immediately instead of long-polling.
#[derive(Debug, Clone)]
pub struct InMemoryQueueTransport {
    state: Arc<Mutex<InMemoryQueueState>>,
    dedup_window: Duration,
}

impl Default for InMemoryQueueTransport {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

impl InMemoryQueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport with the named queues already declared.
    pub async fn with_queues(names: &[&str]) -> Self {
        let transport = Self::new();
        for name in names {
            transport.create_queue(name).await;
        }
        transport
    }

    pub async fn create_queue(&self, name: &str) {
        self.state
            .lock()
            .await
            .queues
            .entry(name.to_string())
            .or_default();
    }

    /// The next `n` sends fail with a transient transport error.
    pub async fn fail_next_sends(&self, n: usize) {
        self.state.lock().await.fail_sends = n;
    }

    /// The next `n` receives fail with a transient transport error.
    pub async fn fail_next_receives(&self, n: usize) {
        self.state.lock().await.fail_receives = n;
    }

    /// The next `n` delete batches report every entry as failed.
    pub async fn fail_next_deletes(&self, n: usize) {
        self.state.lock().await.fail_deletes = n;
    }

    /// Total messages held by the queue, visible or in flight.
    pub async fn message_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Messages currently hidden by a visibility timeout.
    pub async fn in_flight_count(&self, queue: &str) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.messages.iter().filter(|m| m.in_flight(now)).count())
            .unwrap_or(0)
    }

    /// Sends that were enqueued, excluding deduplicated ones.
    pub async fn accepted_sends(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.accepted_sends)
            .unwrap_or(0)
    }

    /// Bodies of every message held by the queue, in FIFO order.
    pub async fn bodies(&self, queue: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Ends every visibility timeout so in-flight messages are redelivered,
    /// as if the consumer crashed before deleting them.
    pub async fn expire_in_flight(&self, queue: &str) {
        let now = Instant::now();
        if let Some(q) = self.state.lock().await.queues.get_mut(queue) {
            for message in q.messages.iter_mut() {
                message.visible_at = now;
            }
        }
    }

    fn queue_mut<'a>(
        state: &'a mut InMemoryQueueState,
        queue: &str,
    ) -> Result<&'a mut QueueState> {
        state
            .queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueueTransport {
    async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(QueueError::Transport("injected send failure".to_string()));
        }

        let now = Instant::now();
        let window = self.dedup_window;
        let q = Self::queue_mut(&mut state, queue)?;
        q.dedup
            .retain(|_, (sent_at, _)| now.duration_since(*sent_at) < window);

        if let Some((_, message_id)) = q.dedup.get(&message.deduplication_id) {
            return Ok(message_id.clone());
        }

        let message_id = Uuid::new_v4().to_string();
        q.dedup
            .insert(message.deduplication_id, (now, message_id.clone()));
        q.messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            group_id: message.group_id,
            body: message.body,
            receive_count: 0,
            receipt_handle: None,
            visible_at: now,
        });
        q.accepted_sends += 1;

        Ok(message_id)
    }

    async fn receive(&self, queue: &str, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>> {
        let mut state = self.state.lock().await;
        if state.fail_receives > 0 {
            state.fail_receives -= 1;
            return Err(QueueError::Transport("injected receive failure".to_string()));
        }

        let now = Instant::now();
        let q = Self::queue_mut(&mut state, queue)?;

        // A group with a message in flight is blocked until it is deleted
        // or becomes visible again.
        let mut blocked: HashSet<String> = q
            .messages
            .iter()
            .filter(|m| m.in_flight(now))
            .map(|m| m.group_id.clone())
            .collect();

        let mut received = Vec::new();
        for message in q.messages.iter_mut() {
            if received.len() >= options.max_messages {
                break;
            }
            if message.visible_at > now || blocked.contains(&message.group_id) {
                continue;
            }

            let handle = Uuid::new_v4().to_string();
            message.receipt_handle = Some(handle.clone());
            message.receive_count += 1;
            message.visible_at = now + options.visibility_timeout;
            blocked.insert(message.group_id.clone());

            received.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                receipt_handle: handle,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
        }

        Ok(received)
    }

    async fn delete_batch(&self, queue: &str, entries: &[BatchEntry]) -> Result<BatchOutcome> {
        let mut state = self.state.lock().await;
        let inject = state.fail_deletes > 0;
        if inject {
            state.fail_deletes -= 1;
        }

        let q = Self::queue_mut(&mut state, queue)?;
        let mut outcome = BatchOutcome::default();
        for entry in entries {
            if inject {
                outcome.failed.push(BatchFailure {
                    id: entry.id.clone(),
                    code: "InternalError".to_string(),
                });
                continue;
            }

            let position = q
                .messages
                .iter()
                .position(|m| m.receipt_handle.as_deref() == Some(entry.receipt_handle.as_str()));
            match position {
                Some(index) => {
                    q.messages.remove(index);
                }
                None => outcome.failed.push(BatchFailure {
                    id: entry.id.clone(),
                    code: "ReceiptHandleIsInvalid".to_string(),
                }),
            }
        }

        Ok(outcome)
    }

    async fn change_visibility_batch(
        &self,
        queue: &str,
        entries: &[BatchEntry],
        timeout: Duration,
    ) -> Result<BatchOutcome> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let q = Self::queue_mut(&mut state, queue)?;

        let mut outcome = BatchOutcome::default();
        for entry in entries {
            match q
                .messages
                .iter_mut()
                .find(|m| m.receipt_handle.as_deref() == Some(entry.receipt_handle.as_str()))
            {
                Some(message) => message.visible_at = now + timeout,
                None => outcome.failed.push(BatchFailure {
                    id: entry.id.clone(),
                    code: "ReceiptHandleIsInvalid".to_string(),
                }),
            }
        }

        Ok(outcome)
    }
}

/// A message recorded by [`InMemoryTopic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message_id: String,
    pub body: String,
    pub deduplication_id: String,
}

#[derive(Debug, Default)]
struct TopicState {
    published: Vec<PublishedMessage>,
    dedup: HashMap<String, (Instant, String)>,
    fail_publishes: usize,
}

/// In-memory notification topic that records what was published.
#[derive(Debug, Clone)]
pub struct InMemoryTopic {
    state: Arc<Mutex<TopicState>>,
    dedup_window: Duration,
}

impl Default for InMemoryTopic {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

impl InMemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` publishes fail with a transient transport error.
    pub async fn fail_next_publishes(&self, n: usize) {
        self.state.lock().await.fail_publishes = n;
    }

    /// Messages delivered to subscribers of `topic`, excluding duplicates.
    pub async fn published(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TopicTransport for InMemoryTopic {
    async fn publish(&self, topic: &str, message: OutgoingMessage) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            return Err(QueueError::Transport("injected publish failure".to_string()));
        }

        let now = Instant::now();
        let window = self.dedup_window;
        state
            .dedup
            .retain(|_, (sent_at, _)| now.duration_since(*sent_at) < window);

        let dedup_key = format!("{topic}:{}", message.deduplication_id);
        if let Some((_, message_id)) = state.dedup.get(&dedup_key) {
            return Ok(message_id.clone());
        }

        let message_id = Uuid::new_v4().to_string();
        state.dedup.insert(dedup_key, (now, message_id.clone()));
        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            message_id: message_id.clone(),
            body: message.body,
            deduplication_id: message.deduplication_id,
        });

        Ok(message_id)
    }
}
