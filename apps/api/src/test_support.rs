use std::sync::{Arc, Mutex, PoisonError};

use bulwark_application::{
    Clock, ProtectionDependencies, ProtectionSettings, SecurityEventService,
};
use bulwark_domain::Identity;
use bulwark_infrastructure::{
    InMemoryKeyValueStore, InMemoryProtectionRepository, StaticIdentityResolver,
};
use chrono::{DateTime, TimeZone, Utc};

use crate::protection_registry::ProtectionRegistry;
use crate::state::AppState;

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(
                Utc.timestamp_millis_opt(1_700_000_000_000)
                    .single()
                    .unwrap_or_default(),
            ),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn loopback() -> Identity {
    match Identity::new("127.0.0.1") {
        Ok(identity) => identity,
        Err(error) => panic!("identity should be valid: {error}"),
    }
}

pub fn memory_dependencies(
    clock: Arc<ManualClock>,
) -> (ProtectionDependencies, Arc<InMemoryProtectionRepository>) {
    let repository = Arc::new(InMemoryProtectionRepository::new(clock.clone()));
    let dependencies = ProtectionDependencies {
        identity_resolver: Arc::new(StaticIdentityResolver::new(loopback())),
        block_repository: repository.clone(),
        alert_repository: repository.clone(),
        rate_limit_procedure: repository.clone(),
        key_value_store: Arc::new(InMemoryKeyValueStore::new()),
        clock,
    };

    (dependencies, repository)
}

/// State backed entirely by in-memory adapters. Returns the repository so
/// tests can inspect stored audit events.
pub fn memory_state(settings: ProtectionSettings) -> (AppState, Arc<InMemoryProtectionRepository>) {
    let clock = Arc::new(ManualClock::default());
    let (dependencies, repository) = memory_dependencies(clock.clone());

    let state = AppState {
        protection_registry: Arc::new(ProtectionRegistry::new(
            dependencies,
            settings,
            std::time::Duration::from_secs(30 * 60),
            10_000,
        )),
        security_event_service: SecurityEventService::new(repository.clone(), clock),
    };

    (state, repository)
}
