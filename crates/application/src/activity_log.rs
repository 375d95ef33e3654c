//! Per-session log of recent protected requests.
//!
//! Timestamps are epoch milliseconds persisted as a JSON array through the
//! [`KeyValueStore`] port. Storage problems never surface to callers: the log
//! falls back to its in-memory copy and keeps counting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use bulwark_core::AppResult;
use bulwark_domain::HOUR_WINDOW_MS;

use crate::network_timeout::{DEFAULT_NETWORK_TIMEOUT, with_timeout};

/// Storage key used when no session scope is configured.
pub const DEFAULT_ACTIVITY_LOG_KEY: &str = "ddos_requests";

/// Key-value storage port backing the activity log.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the bytes stored under `key`.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Replaces the bytes stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> AppResult<()>;
}

/// Pruned, persisted ring of request timestamps for one session.
pub struct LocalActivityLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
    fallback: Mutex<Vec<i64>>,
    network_timeout: Duration,
}

impl LocalActivityLog {
    /// Creates a log stored under `key`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            fallback: Mutex::new(Vec::new()),
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Overrides the limit applied to each storage call.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Returns the storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Appends `now` and persists the entries from the last hour.
    pub async fn record(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let mut fallback = self.fallback.lock().await;

        let mut entries = self.load(&fallback).await;
        entries.push(now_ms);
        prune(&mut entries, now_ms);

        match serde_json::to_vec(&entries) {
            Ok(bytes) => {
                let write = self.store.set(self.key.as_str(), bytes);
                if let Err(error) =
                    with_timeout(self.network_timeout, "activity log write", write).await
                {
                    warn!(key = %self.key, error = %error, "failed to persist activity log");
                }
            }
            Err(error) => {
                warn!(key = %self.key, error = %error, "failed to encode activity log");
            }
        }

        *fallback = entries;
    }

    /// Counts entries in `(now - window_ms, now]`.
    pub async fn count_within(&self, window_ms: i64, now: DateTime<Utc>) -> usize {
        let fallback = self.fallback.lock().await;
        let entries = self.load(&fallback).await;
        count_within(&entries, window_ms, now.timestamp_millis())
    }

    async fn load(&self, fallback: &[i64]) -> Vec<i64> {
        let read = self.store.get(self.key.as_str());
        match with_timeout(self.network_timeout, "activity log read", read).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<i64>>(&bytes) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(key = %self.key, error = %error, "discarding corrupt activity log");
                    fallback.to_vec()
                }
            },
            Ok(None) => fallback.to_vec(),
            Err(error) => {
                warn!(key = %self.key, error = %error, "activity log storage unavailable");
                fallback.to_vec()
            }
        }
    }
}

/// Drops entries that are an hour old or older.
pub(crate) fn prune(entries: &mut Vec<i64>, now_ms: i64) {
    let cutoff = now_ms.saturating_sub(HOUR_WINDOW_MS);
    entries.retain(|timestamp| *timestamp > cutoff);
}

/// Counts entries in `(now_ms - window_ms, now_ms]`.
pub(crate) fn count_within(entries: &[i64], window_ms: i64, now_ms: i64) -> usize {
    let cutoff = now_ms.saturating_sub(window_ms);
    entries
        .iter()
        .filter(|timestamp| **timestamp > cutoff && **timestamp <= now_ms)
        .count()
}

#[cfg(test)]
mod tests;
