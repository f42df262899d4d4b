//! Retry and decoding behavior of the queue client over the in-memory transport.

use std::time::Duration;

use queue::{
    InMemoryQueueTransport, InMemoryTopic, QueueClient, QueueError, QueueTransport,
    ReceiveOptions, RetryPolicy, TopicClient,
};
use serde::{Deserialize, Serialize};

const QUEUE: &str = "payment-status.fifo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    order_id: String,
    seq: u32,
}

fn ping(seq: u32) -> Ping {
    Ping {
        order_id: "cus-1-1".to_string(),
        seq,
    }
}

fn options() -> ReceiveOptions {
    ReceiveOptions {
        max_messages: 10,
        visibility_timeout: Duration::from_secs(90),
        wait_time: Duration::ZERO,
    }
}

async fn client(max_retries: usize) -> QueueClient<InMemoryQueueTransport> {
    let transport = InMemoryQueueTransport::with_queues(&[QUEUE]).await;
    QueueClient::new(transport, RetryPolicy::immediate(max_retries))
}

#[tokio::test]
async fn test_send_json_deduplicates_identical_content() {
    let client = client(2).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    client.send_json(QUEUE, &ping(2)).await.unwrap();

    assert_eq!(client.transport().message_count(QUEUE).await, 2);
}

#[tokio::test]
async fn test_explicit_dedup_id_distinguishes_identical_content() {
    let client = client(2).await;
    client
        .send_json_with_dedup(QUEUE, &ping(1), "attempt-a")
        .await
        .unwrap();
    client
        .send_json_with_dedup(QUEUE, &ping(1), "attempt-b")
        .await
        .unwrap();

    assert_eq!(client.transport().message_count(QUEUE).await, 2);
}

#[tokio::test]
async fn test_send_retries_transient_failures() {
    let client = client(2).await;
    client.transport().fail_next_sends(2).await;

    client.send_json(QUEUE, &ping(1)).await.unwrap();
    assert_eq!(client.transport().message_count(QUEUE).await, 1);
}

#[tokio::test]
async fn test_send_surfaces_error_after_retry_bound() {
    let client = client(2).await;
    client.transport().fail_next_sends(3).await;

    let err = client.send_json(QUEUE, &ping(1)).await.unwrap_err();
    assert!(matches!(err, QueueError::Transport(_)));
    assert_eq!(client.transport().message_count(QUEUE).await, 0);
}

#[tokio::test]
async fn test_send_to_missing_queue_is_not_retried() {
    let client = client(4).await;
    let err = client.send_json("nope.fifo", &ping(1)).await.unwrap_err();
    assert!(matches!(err, QueueError::QueueNotFound(_)));
}

#[tokio::test]
async fn test_receive_batch_on_empty_queue_is_empty_not_error() {
    let client = client(2).await;
    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 3)
        .await
        .unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_receive_batch_skips_malformed_messages() {
    let client = client(2).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    client
        .transport()
        .send(
            QUEUE,
            queue::OutgoingMessage {
                body: "{not json".to_string(),
                deduplication_id: "bad".to_string(),
                group_id: "bad".to_string(),
            },
        )
        .await
        .unwrap();
    client.send_json(QUEUE, &ping(2)).await.unwrap();

    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 0)
        .await
        .unwrap();
    let seqs: Vec<_> = batch.delivered.iter().map(|d| d.body.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(batch.malformed.len(), 1);
    assert_eq!(batch.ack_entries().len(), 3);
}

#[tokio::test]
async fn test_receive_retries_transient_failures() {
    let client = client(2).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    client.transport().fail_next_receives(1).await;

    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 0)
        .await
        .unwrap();
    assert_eq!(batch.delivered.len(), 1);
}

#[tokio::test]
async fn test_delete_batch_retries_failed_entries() {
    let client = client(2).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 0)
        .await
        .unwrap();

    client.transport().fail_next_deletes(1).await;
    client.delete_batch(QUEUE, batch.ack_entries()).await.unwrap();
    assert_eq!(client.transport().message_count(QUEUE).await, 0);
}

#[tokio::test]
async fn test_delete_batch_gives_up_after_bound() {
    let client = client(1).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 0)
        .await
        .unwrap();

    client.transport().fail_next_deletes(5).await;
    let err = client
        .delete_batch(QUEUE, batch.ack_entries())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::BatchIncomplete {
            operation: "delete",
            failed: 1
        }
    ));
}

#[tokio::test]
async fn test_empty_delete_batch_is_noop() {
    let client = client(0).await;
    client.delete_batch(QUEUE, Vec::new()).await.unwrap();
}

#[tokio::test]
async fn test_change_visibility_releases_batch() {
    let client = client(2).await;
    client.send_json(QUEUE, &ping(1)).await.unwrap();
    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 0)
        .await
        .unwrap();
    assert_eq!(client.transport().in_flight_count(QUEUE).await, 1);

    client
        .change_visibility_batch(QUEUE, batch.ack_entries(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(client.transport().in_flight_count(QUEUE).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_polls_back_off_exponentially() {
    let transport = InMemoryQueueTransport::with_queues(&[QUEUE]).await;
    let client = QueueClient::new(transport, RetryPolicy::new(4, Duration::from_secs(1)));

    let started = tokio::time::Instant::now();
    let batch = client
        .receive_batch::<Ping>(QUEUE, &options(), 2)
        .await
        .unwrap();

    assert!(batch.is_empty());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_topic_client_retries_publish() {
    let topic = InMemoryTopic::new();
    topic.fail_next_publishes(1).await;
    let client = TopicClient::new(topic.clone(), RetryPolicy::immediate(2));

    client
        .publish_json("fulfillment", &ping(1), "cus-1-1:PAYMENT_SUCCESS")
        .await
        .unwrap();
    assert_eq!(topic.published("fulfillment").await.len(), 1);
}
