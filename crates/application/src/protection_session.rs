//! One browser session's view of the abuse-mitigation layer.
//!
//! A session owns its activity log, observable state and timers. The
//! request-count ticker only runs once someone subscribes; otherwise the count
//! is recomputed on demand. Dropping the session cancels every timer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;
use tracing::debug;

use bulwark_core::AppResult;
use bulwark_domain::{AbuseDecision, AbuseThresholds, MINUTE_WINDOW_MS};

use crate::network_timeout::DEFAULT_NETWORK_TIMEOUT;
use crate::{
    AbuseHeuristicService, BlockRecordRepository, BlockStatusService, Clock, IdentityResolver,
    KeyValueStore, LocalActivityLog, ProtectionState, ProtectionStateHandle, RateLimitProcedure,
    RateLimitRule, RateLimitService, RateLimitVerdict, ScheduledTask, SecurityAlertRepository,
};

/// Tunables shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionSettings {
    /// Heuristic thresholds.
    pub thresholds: AbuseThresholds,
    /// Attempts allowed per window for named actions.
    pub rate_limit_max_attempts: u32,
    /// Window for named actions, in minutes.
    pub rate_limit_window_minutes: u32,
    /// Limit applied to every collaborator call.
    pub network_timeout: Duration,
    /// Period of the request-count refresh while subscribed.
    pub request_count_refresh: Duration,
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        Self {
            thresholds: AbuseThresholds::default(),
            rate_limit_max_attempts: RateLimitRule::DEFAULT_MAX_ATTEMPTS,
            rate_limit_window_minutes: RateLimitRule::DEFAULT_WINDOW_MINUTES,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
            request_count_refresh: Duration::from_secs(1),
        }
    }
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct ProtectionDependencies {
    /// Caller identity lookup.
    pub identity_resolver: Arc<dyn IdentityResolver>,
    /// Persisted block table.
    pub block_repository: Arc<dyn BlockRecordRepository>,
    /// Security alert sink.
    pub alert_repository: Arc<dyn SecurityAlertRepository>,
    /// Sliding-window rate limit procedure.
    pub rate_limit_procedure: Arc<dyn RateLimitProcedure>,
    /// Activity log storage.
    pub key_value_store: Arc<dyn KeyValueStore>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

impl ProtectionDependencies {
    /// Returns a copy resolving identities with `identity_resolver`.
    #[must_use]
    pub fn with_identity_resolver(&self, identity_resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            identity_resolver,
            ..self.clone()
        }
    }
}

/// Abuse protection for one session.
pub struct ProtectionSession {
    activity_log: Arc<LocalActivityLog>,
    heuristic: AbuseHeuristicService,
    rate_limit_service: RateLimitService,
    settings: ProtectionSettings,
    clock: Arc<dyn Clock>,
    state: ProtectionStateHandle,
    last_activity_ms: AtomicI64,
    request_count_ticker: Mutex<Option<ScheduledTask>>,
}

impl ProtectionSession {
    /// Starts a session whose activity log lives under `storage_key`.
    ///
    /// Restores any active persisted block before returning.
    pub async fn start(
        dependencies: ProtectionDependencies,
        settings: ProtectionSettings,
        storage_key: impl Into<String>,
    ) -> Self {
        let state = ProtectionStateHandle::new();
        let activity_log = Arc::new(
            LocalActivityLog::new(dependencies.key_value_store.clone(), storage_key)
                .with_network_timeout(settings.network_timeout),
        );

        let block_status = BlockStatusService::new(
            dependencies.identity_resolver.clone(),
            dependencies.block_repository.clone(),
            dependencies.clock.clone(),
            state.clone(),
        )
        .with_network_timeout(settings.network_timeout);
        let restored = block_status.check().await;

        let heuristic = AbuseHeuristicService::new(
            settings.thresholds,
            activity_log.clone(),
            dependencies.identity_resolver.clone(),
            dependencies.block_repository.clone(),
            dependencies.alert_repository.clone(),
            state.clone(),
        )
        .with_network_timeout(settings.network_timeout);

        let rate_limit_service = RateLimitService::new(
            dependencies.identity_resolver.clone(),
            dependencies.rate_limit_procedure.clone(),
        )
        .with_network_timeout(settings.network_timeout);

        let now = dependencies.clock.now();
        state.set_request_count(activity_log.count_within(MINUTE_WINDOW_MS, now).await);

        debug!(key = %activity_log.key(), restored_block = restored, "protection session started");

        Self {
            activity_log,
            heuristic,
            rate_limit_service,
            settings,
            clock: dependencies.clock,
            state,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            request_count_ticker: Mutex::new(None),
        }
    }

    /// Records one protected request and returns the decision.
    pub async fn log_request(&self) -> AbuseDecision {
        let now = self.touch();
        self.heuristic.evaluate(now).await
    }

    /// Checks the server-side limit for a named action.
    ///
    /// Only an invalid action name is an error; infrastructure failures allow.
    pub async fn check_rate_limit(&self, action: &str) -> AppResult<RateLimitVerdict> {
        self.touch();
        let rule = RateLimitRule::new(
            action,
            self.settings.rate_limit_max_attempts,
            self.settings.rate_limit_window_minutes,
        )?;

        Ok(self.rate_limit_service.check_rate_limit(&rule).await)
    }

    /// Returns the current observable state.
    #[must_use]
    pub fn state(&self) -> ProtectionState {
        self.state.snapshot()
    }

    /// Recounts the last minute and returns the resulting state.
    pub async fn refresh(&self) -> ProtectionState {
        let count = self
            .activity_log
            .count_within(MINUTE_WINDOW_MS, self.clock.now())
            .await;
        self.state.set_request_count(count);
        self.state.snapshot()
    }

    /// Subscribes to state changes, starting the request-count ticker on
    /// first use.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProtectionState> {
        let receiver = self.state.subscribe();
        let mut ticker = self
            .request_count_ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if ticker.is_none() {
            *ticker = Some(self.spawn_request_count_ticker());
        }
        receiver
    }

    /// Returns whether the request-count ticker is running.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.request_count_ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the settings this session runs with.
    #[must_use]
    pub fn settings(&self) -> &ProtectionSettings {
        &self.settings
    }

    /// Returns when the session last handled a call.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_activity_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or_else(|| self.clock.now())
    }

    fn spawn_request_count_ticker(&self) -> ScheduledTask {
        let activity_log = self.activity_log.clone();
        let clock = self.clock.clone();
        let state = self.state.clone();
        ScheduledTask::every(self.settings.request_count_refresh, move || {
            let activity_log = activity_log.clone();
            let clock = clock.clone();
            let state = state.clone();
            async move {
                let count = activity_log
                    .count_within(MINUTE_WINDOW_MS, clock.now())
                    .await;
                state.set_request_count(count);
            }
        })
    }

    fn touch(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        self.last_activity_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
        now
    }
}

impl Drop for ProtectionSession {
    fn drop(&mut self) {
        self.state.cancel_timers();
    }
}
