use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use bulwark_core::{AppError, AppResult};
use bulwark_domain::{BlockRecord, Identity, SecurityAlert, SecurityEvent};

use crate::{
    BlockRecordRepository, Clock, IdentityResolver, KeyValueStore, RateLimitProcedure,
    SecurityAlertRepository, SecurityEventRepository,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn epoch() -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(1_700_000_000_000).single() {
        Some(value) => value,
        None => panic!("fixed epoch should be representable"),
    }
}

pub(crate) fn identity(value: &str) -> Identity {
    match Identity::new(value) {
        Ok(identity) => identity,
        Err(error) => panic!("test identity should be valid: {error}"),
    }
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = locked(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *locked(&self.now)
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub(crate) fn raw(&self, key: &str) -> Option<Vec<u8>> {
        locked(&self.values).get(key).cloned()
    }

    pub(crate) fn put(&self, key: &str, value: &[u8]) {
        locked(&self.values).insert(key.to_owned(), value.to_vec());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        Ok(locked(&self.values).get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> AppResult<()> {
        locked(&self.values).insert(key.to_owned(), value);
        Ok(())
    }
}

pub(crate) struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        Err(AppError::Unavailable("storage disabled".to_owned()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> AppResult<()> {
        Err(AppError::Unavailable("storage disabled".to_owned()))
    }
}

pub(crate) struct HangingStore;

#[async_trait]
impl KeyValueStore for HangingStore {
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        std::future::pending::<AppResult<Option<Vec<u8>>>>().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> AppResult<()> {
        std::future::pending::<AppResult<()>>().await
    }
}

pub(crate) struct FixedIdentityResolver {
    identity: Identity,
    calls: AtomicUsize,
}

impl FixedIdentityResolver {
    pub(crate) fn new(value: &str) -> Self {
        Self {
            identity: identity(value),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for FixedIdentityResolver {
    async fn resolve(&self) -> AppResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.identity.clone())
    }
}

pub(crate) struct FailingIdentityResolver;

#[async_trait]
impl IdentityResolver for FailingIdentityResolver {
    async fn resolve(&self) -> AppResult<Identity> {
        Err(AppError::Internal("ip lookup failed".to_owned()))
    }
}

pub(crate) struct HangingIdentityResolver;

#[async_trait]
impl IdentityResolver for HangingIdentityResolver {
    async fn resolve(&self) -> AppResult<Identity> {
        std::future::pending::<AppResult<Identity>>().await
    }
}

#[derive(Default)]
pub(crate) struct RecordingBlockRepository {
    records: Mutex<HashMap<Identity, BlockRecord>>,
    upserts: Mutex<Vec<BlockRecord>>,
    queries: AtomicUsize,
    fail: bool,
}

impl RecordingBlockRepository {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_record(record: BlockRecord) -> Self {
        let repository = Self::default();
        locked(&repository.records).insert(record.identity.clone(), record);
        repository
    }

    pub(crate) fn upserts(&self) -> Vec<BlockRecord> {
        locked(&self.upserts).clone()
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockRecordRepository for RecordingBlockRepository {
    async fn find_active(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BlockRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Internal("datastore unreachable".to_owned()));
        }

        Ok(locked(&self.records)
            .get(identity)
            .filter(|record| record.is_active_at(now))
            .cloned())
    }

    async fn upsert(&self, record: BlockRecord) -> AppResult<()> {
        locked(&self.upserts).push(record.clone());
        if self.fail {
            return Err(AppError::Internal("datastore unreachable".to_owned()));
        }

        locked(&self.records).insert(record.identity.clone(), record);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingAlertRepository {
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl RecordingAlertRepository {
    pub(crate) fn alerts(&self) -> Vec<SecurityAlert> {
        locked(&self.alerts).clone()
    }
}

#[async_trait]
impl SecurityAlertRepository for RecordingAlertRepository {
    async fn append_alert(&self, alert: SecurityAlert) -> AppResult<()> {
        locked(&self.alerts).push(alert);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingEventRepository {
    events: Mutex<Vec<SecurityEvent>>,
    fail: bool,
}

impl RecordingEventRepository {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<SecurityEvent> {
        locked(&self.events).clone()
    }
}

#[async_trait]
impl SecurityEventRepository for RecordingEventRepository {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("audit log unreachable".to_owned()));
        }

        locked(&self.events).push(event);
        Ok(())
    }
}

/// Records calls and answers with a scripted result.
pub(crate) struct ScriptedRateLimitProcedure {
    answer: Result<bool, String>,
    calls: Mutex<Vec<(String, String, u32, u32)>>,
}

impl ScriptedRateLimitProcedure {
    pub(crate) fn answering(allowed: bool) -> Self {
        Self {
            answer: Ok(allowed),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_owned()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, String, u32, u32)> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl RateLimitProcedure for ScriptedRateLimitProcedure {
    async fn check_rate_limit(
        &self,
        identity: &Identity,
        action_type: &str,
        max_attempts: u32,
        window_minutes: u32,
    ) -> AppResult<bool> {
        locked(&self.calls).push((
            identity.as_str().to_owned(),
            action_type.to_owned(),
            max_attempts,
            window_minutes,
        ));

        self.answer
            .clone()
            .map_err(AppError::Internal)
    }
}
