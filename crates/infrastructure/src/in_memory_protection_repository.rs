//! Process-local stand-in for the protection tables and the rate limit
//! procedure. State is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use bulwark_application::{
    BlockRecordRepository, Clock, RateLimitProcedure, SecurityAlertRepository,
    SecurityEventRepository,
};
use bulwark_core::AppResult;
use bulwark_domain::{BlockRecord, Identity, SecurityAlert, SecurityEvent};

type AttemptKey = (Identity, String);

/// Table size that triggers the first full sweep of stale attempt keys.
const INITIAL_SWEEP_AT: usize = 1_024;

struct AttemptLog {
    window: Duration,
    attempts: Vec<DateTime<Utc>>,
}

impl AttemptLog {
    fn prune(&mut self, now: DateTime<Utc>) {
        let window_start = now - self.window;
        self.attempts
            .retain(|attempted_at| *attempted_at > window_start);
    }
}

struct AttemptTable {
    logs: HashMap<AttemptKey, AttemptLog>,
    sweep_at: usize,
}

impl AttemptTable {
    /// Drops every key whose attempts have all left their window.
    fn sweep(&mut self, now: DateTime<Utc>) {
        self.logs.retain(|_, log| {
            log.prune(now);
            !log.attempts.is_empty()
        });
        self.sweep_at = (self.logs.len() * 2).max(INITIAL_SWEEP_AT);
    }
}

/// In-memory implementation of every protection persistence port.
pub struct InMemoryProtectionRepository {
    clock: Arc<dyn Clock>,
    blocks: RwLock<HashMap<Identity, BlockRecord>>,
    alerts: RwLock<Vec<SecurityAlert>>,
    events: RwLock<Vec<SecurityEvent>>,
    attempts: RwLock<AttemptTable>,
}

impl InMemoryProtectionRepository {
    /// Creates an empty repository. `clock` timestamps rate limit attempts.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            blocks: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            attempts: RwLock::new(AttemptTable {
                logs: HashMap::new(),
                sweep_at: INITIAL_SWEEP_AT,
            }),
        }
    }

    /// Returns every stored alert, oldest first.
    pub async fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.read().await.clone()
    }

    /// Returns every stored audit event, oldest first.
    pub async fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().await.clone()
    }

    /// Number of stored block records, expired ones included.
    pub async fn block_count(&self) -> usize {
        self.blocks.read().await.len()
    }

    /// Number of (identity, action) keys holding rate limit attempts.
    pub async fn attempt_key_count(&self) -> usize {
        self.attempts.read().await.logs.len()
    }
}

#[async_trait]
impl BlockRecordRepository for InMemoryProtectionRepository {
    async fn find_active(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BlockRecord>> {
        let expired = match self.blocks.read().await.get(identity) {
            Some(record) if record.is_active_at(now) => return Ok(Some(record.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            let mut blocks = self.blocks.write().await;
            if blocks
                .get(identity)
                .is_some_and(|record| !record.is_active_at(now))
            {
                blocks.remove(identity);
            }
        }

        Ok(None)
    }

    async fn upsert(&self, record: BlockRecord) -> AppResult<()> {
        let now = self.clock.now();
        let mut blocks = self.blocks.write().await;
        blocks.retain(|_, existing| existing.is_active_at(now));
        blocks.insert(record.identity.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl SecurityAlertRepository for InMemoryProtectionRepository {
    async fn append_alert(&self, alert: SecurityAlert) -> AppResult<()> {
        self.alerts.write().await.push(alert);
        Ok(())
    }
}

#[async_trait]
impl SecurityEventRepository for InMemoryProtectionRepository {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl RateLimitProcedure for InMemoryProtectionRepository {
    async fn check_rate_limit(
        &self,
        identity: &Identity,
        action_type: &str,
        max_attempts: u32,
        window_minutes: u32,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        let window = Duration::minutes(i64::from(window_minutes));
        let max_attempts = usize::try_from(max_attempts).unwrap_or(usize::MAX);

        let mut table = self.attempts.write().await;
        let key = (identity.clone(), action_type.to_owned());
        let log = table.logs.entry(key.clone()).or_insert_with(|| AttemptLog {
            window,
            attempts: Vec::new(),
        });
        log.window = window;
        log.prune(now);

        let allowed = log.attempts.len() < max_attempts;
        if allowed {
            log.attempts.push(now);
        } else if log.attempts.is_empty() {
            table.logs.remove(&key);
        }

        if table.logs.len() >= table.sweep_at {
            table.sweep(now);
        }

        Ok(allowed)
    }
}
