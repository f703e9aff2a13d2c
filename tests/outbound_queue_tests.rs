// OutboundQueue: immediate write, queue on failure, drain retries, drop after MAX_ATTEMPTS

mod common;

use std::sync::Arc;

use common::{MemoryTabularClient, sample};
use steam_player_tracker::models::{Record, RecordKind};
use steam_player_tracker::outbound_queue::{
    DrainReport, MAX_ATTEMPTS, OutboundQueue, QueueError,
};
use steam_player_tracker::sheets::{RateLimiter, SheetStore};

fn queue_with_client() -> (Arc<MemoryTabularClient>, OutboundQueue) {
    let client = Arc::new(MemoryTabularClient::new());
    let store = Arc::new(SheetStore::new(
        client.clone(),
        Arc::new(RateLimiter::default()),
        "PlayerData",
        RecordKind::Sample,
    ));
    (client, OutboundQueue::new(Some(store), None))
}

fn record(ts: &str) -> Record {
    sample(ts, 150).into()
}

#[tokio::test(start_paused = true)]
async fn successful_write_is_not_queued() {
    let (client, queue) = queue_with_client();
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();
    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(client.rows("PlayerData").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_queued_with_zero_attempts() {
    let (client, queue) = queue_with_client();
    client.set_unavailable(true);
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();

    let status = queue.status();
    assert_eq!(status.queue_length, 1);
    assert!(!status.is_processing);
}

#[tokio::test(start_paused = true)]
async fn item_is_dropped_after_max_failed_drains() {
    let (client, queue) = queue_with_client();
    client.set_unavailable(true);
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();

    for attempt in 1..MAX_ATTEMPTS {
        let report = queue.drain_once().await.unwrap();
        assert_eq!(report.retained, 1, "after drain {attempt}");
        assert_eq!(queue.status().queue_length, 1);
    }
    let report = queue.drain_once().await.unwrap();
    assert_eq!(
        report,
        DrainReport {
            written: 0,
            retained: 0,
            dropped: 1
        }
    );
    assert_eq!(queue.status().queue_length, 0);

    // Service recovers, but the dropped record is gone for good.
    client.set_unavailable(false);
    let requests = client.request_count();
    assert_eq!(queue.drain_once().await.unwrap(), DrainReport::default());
    assert_eq!(client.request_count(), requests);
    assert!(client.rows("PlayerData").is_empty());
}

#[tokio::test(start_paused = true)]
async fn item_written_on_second_drain_is_not_retried_again() {
    let (client, queue) = queue_with_client();
    client.set_unavailable(true);
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();

    let first = queue.drain_once().await.unwrap();
    assert_eq!(first.retained, 1);

    client.set_unavailable(false);
    let second = queue.drain_once().await.unwrap();
    assert_eq!(second.written, 1);
    assert_eq!(queue.status().queue_length, 0);

    let requests = client.request_count();
    queue.drain_once().await.unwrap();
    assert_eq!(client.request_count(), requests);
    assert_eq!(client.rows("PlayerData").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn survivors_keep_their_order() {
    let (client, queue) = queue_with_client();
    client.set_unavailable(true);
    for ts in ["2025-01-01 00:00:00", "2025-01-01 00:30:00", "2025-01-01 01:00:00"] {
        queue.enqueue_or_write(record(ts)).await.unwrap();
    }
    queue.drain_once().await.unwrap();

    client.set_unavailable(false);
    let report = queue.drain_once().await.unwrap();
    assert_eq!(report.written, 3);
    let keys: Vec<String> = client
        .rows("PlayerData")
        .into_iter()
        .skip(1)
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(
        keys,
        vec!["2025-01-01 00:00:00", "2025-01-01 00:30:00", "2025-01-01 01:00:00"]
    );
}

#[tokio::test]
async fn missing_store_for_kind_is_an_error() {
    let queue = OutboundQueue::new(None, None);
    let err = queue
        .enqueue_or_write(record("2025-01-01 00:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::StoreMissing(RecordKind::Sample)));
    assert_eq!(queue.status().queue_length, 0);
}

#[tokio::test(start_paused = true)]
async fn processor_drains_on_interval() {
    let (client, queue) = queue_with_client();
    let queue = Arc::new(queue);
    client.set_unavailable(true);
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();
    client.set_unavailable(false);

    let handle = queue.spawn_processor(std::time::Duration::from_secs(30));
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;
    // Let the drain's Sheets requests (rate limited) complete.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    handle.abort();

    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(client.rows("PlayerData").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn depth_includes_items_being_drained() {
    let (client, queue) = queue_with_client();
    let queue = Arc::new(queue);
    client.set_unavailable(true);
    queue.enqueue_or_write(record("2025-01-01 00:00:00")).await.unwrap();
    queue.enqueue_or_write(record("2025-01-01 00:30:00")).await.unwrap();
    client.set_unavailable(false);

    let draining = Arc::clone(&queue);
    let handle = tokio::spawn(async move { draining.drain_once().await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let status = queue.status();
    assert!(status.is_processing);
    assert_eq!(status.queue_length, 2);

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(queue.status().queue_length, 0);
    assert!(!queue.status().is_processing);
}
