use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use proptest::prelude::*;

use bulwark_domain::{HOUR_WINDOW_MS, MINUTE_WINDOW_MS};

use crate::test_support::{HangingStore, MemoryStore, UnavailableStore, epoch};

use super::{LocalActivityLog, count_within, prune};

#[tokio::test]
async fn record_persists_pruned_json_log() {
    let store = Arc::new(MemoryStore::default());
    let log = LocalActivityLog::new(store.clone(), "ddos_requests");
    let now = epoch();

    log.record(now - Duration::minutes(61)).await;
    log.record(now - Duration::minutes(30)).await;
    log.record(now).await;

    let raw = store.raw("ddos_requests").unwrap_or_default();
    let persisted: Vec<i64> = serde_json::from_slice(&raw).unwrap_or_default();
    assert_eq!(
        persisted,
        vec![
            (now - Duration::minutes(30)).timestamp_millis(),
            now.timestamp_millis()
        ]
    );
}

#[tokio::test]
async fn counts_use_minute_and_hour_windows() {
    let store = Arc::new(MemoryStore::default());
    let log = LocalActivityLog::new(store, "ddos_requests");
    let now = epoch();

    for seconds_ago in [3_000, 1_800, 59, 30, 0] {
        log.record(now - Duration::seconds(seconds_ago)).await;
    }

    assert_eq!(log.count_within(MINUTE_WINDOW_MS, now).await, 3);
    assert_eq!(log.count_within(HOUR_WINDOW_MS, now).await, 5);
}

#[tokio::test]
async fn unavailable_storage_degrades_to_memory() {
    let log = LocalActivityLog::new(Arc::new(UnavailableStore), "ddos_requests");
    let now = epoch();

    log.record(now).await;
    log.record(now).await;

    assert_eq!(log.count_within(MINUTE_WINDOW_MS, now).await, 2);
}

#[tokio::test(start_paused = true)]
async fn hung_storage_times_out_and_degrades_to_memory() {
    let log = LocalActivityLog::new(Arc::new(HangingStore), "ddos_requests")
        .with_network_timeout(StdDuration::from_secs(5));
    let now = epoch();

    let outcome = tokio::time::timeout(StdDuration::from_secs(60), async {
        log.record(now).await;
        log.record(now).await;
        log.count_within(MINUTE_WINDOW_MS, now).await
    })
    .await;

    assert!(outcome.is_ok_and(|count| count == 2));
}

#[tokio::test]
async fn corrupt_storage_is_discarded() {
    let store = Arc::new(MemoryStore::default());
    store.put("ddos_requests", b"not json");
    let log = LocalActivityLog::new(store.clone(), "ddos_requests");
    let now = epoch();

    log.record(now).await;

    assert_eq!(log.count_within(MINUTE_WINDOW_MS, now).await, 1);
    let raw = store.raw("ddos_requests").unwrap_or_default();
    assert_eq!(raw, format!("[{}]", now.timestamp_millis()).into_bytes());
}

#[tokio::test]
async fn logs_with_distinct_keys_do_not_share_counts() {
    let store = Arc::new(MemoryStore::default());
    let first = LocalActivityLog::new(store.clone(), "ddos_requests:first");
    let second = LocalActivityLog::new(store, "ddos_requests:second");
    let now = epoch();

    first.record(now).await;

    assert_eq!(first.count_within(MINUTE_WINDOW_MS, now).await, 1);
    assert_eq!(second.count_within(MINUTE_WINDOW_MS, now).await, 0);
}

#[test]
fn prune_drops_entries_an_hour_old() {
    let now_ms = 10 * HOUR_WINDOW_MS;
    let mut entries = vec![now_ms - HOUR_WINDOW_MS, now_ms - HOUR_WINDOW_MS + 1, now_ms];
    prune(&mut entries, now_ms);
    assert_eq!(entries, vec![now_ms - HOUR_WINDOW_MS + 1, now_ms]);
}

proptest! {
    #[test]
    fn count_matches_half_open_window(
        offsets in proptest::collection::vec(-10_000_i64..200_000, 0..64),
        window in 1_i64..150_000,
    ) {
        let now_ms = 1_700_000_000_000_i64;
        let entries: Vec<i64> = offsets.iter().map(|offset| now_ms - offset).collect();
        let expected = entries
            .iter()
            .filter(|timestamp| **timestamp > now_ms - window && **timestamp <= now_ms)
            .count();

        prop_assert_eq!(count_within(&entries, window, now_ms), expected);
    }
}
