use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use bulwark_core::AppResult;
use bulwark_domain::{
    AbuseDecision, AbuseThresholds, BlockRecord, HOUR_WINDOW_MS, Identity, MINUTE_WINDOW_MS,
    SecurityAlert,
};

use crate::network_timeout::{DEFAULT_NETWORK_TIMEOUT, with_timeout};
use crate::{IdentityResolver, LocalActivityLog, ProtectionStateHandle};

use super::ports::{BlockRecordRepository, SecurityAlertRepository};

/// Application service evaluating protected requests for one session.
#[derive(Clone)]
pub struct AbuseHeuristicService {
    thresholds: AbuseThresholds,
    activity_log: Arc<LocalActivityLog>,
    identity_resolver: Arc<dyn IdentityResolver>,
    block_repository: Arc<dyn BlockRecordRepository>,
    alert_repository: Arc<dyn SecurityAlertRepository>,
    state: ProtectionStateHandle,
    network_timeout: Duration,
}

impl AbuseHeuristicService {
    /// Creates a heuristic bound to one session's log and state.
    #[must_use]
    pub fn new(
        thresholds: AbuseThresholds,
        activity_log: Arc<LocalActivityLog>,
        identity_resolver: Arc<dyn IdentityResolver>,
        block_repository: Arc<dyn BlockRecordRepository>,
        alert_repository: Arc<dyn SecurityAlertRepository>,
        state: ProtectionStateHandle,
    ) -> Self {
        Self {
            thresholds,
            activity_log,
            identity_resolver,
            block_repository,
            alert_repository,
            state,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Overrides the limit applied to identity and datastore calls.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Returns the configured thresholds.
    #[must_use]
    pub fn thresholds(&self) -> &AbuseThresholds {
        &self.thresholds
    }

    /// Records one protected request at `now` and classifies it.
    ///
    /// Side effects complete before the decision is returned. Their failures
    /// are logged and never change the decision.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> AbuseDecision {
        if self.state.is_blocked() {
            return AbuseDecision::Block;
        }

        self.activity_log.record(now).await;

        let per_minute = self.activity_log.count_within(MINUTE_WINDOW_MS, now).await;
        let per_hour = self.activity_log.count_within(HOUR_WINDOW_MS, now).await;
        self.state.set_request_count(per_minute);

        let decision = self.thresholds.classify(per_minute, per_hour);
        match decision {
            AbuseDecision::Block => {
                warn!(per_minute, per_hour, "request thresholds exceeded, blocking session");
                self.persist_block(now).await;
            }
            AbuseDecision::Suspicious => {
                warn!(per_minute, "suspicious request rate");
                self.state.set_warning(true);
                self.raise_alert(per_minute, now).await;
            }
            AbuseDecision::Allow => {
                debug!(per_minute, per_hour, "request allowed");
                self.state.set_warning(false);
            }
        }

        decision
    }

    async fn persist_block(&self, now: DateTime<Utc>) {
        let blocked_until = now + self.thresholds.block_duration();
        self.state.block_until(blocked_until, now);

        let result: AppResult<()> = async {
            let identity = self.resolve_identity().await?;
            let record = BlockRecord::rate_limit_exceeded(identity, now, &self.thresholds);
            with_timeout(
                self.network_timeout,
                "block record upsert",
                self.block_repository.upsert(record),
            )
            .await
        }
        .await;

        if let Err(error) = result {
            warn!(%blocked_until, error = %error, "failed to persist block record");
        }
    }

    async fn raise_alert(&self, per_minute: usize, now: DateTime<Utc>) {
        let result: AppResult<()> = async {
            let identity = self.resolve_identity().await?;
            let alert = SecurityAlert::ddos_attempt(identity, per_minute, now);
            with_timeout(
                self.network_timeout,
                "security alert insert",
                self.alert_repository.append_alert(alert),
            )
            .await
        }
        .await;

        if let Err(error) = result {
            warn!(per_minute, error = %error, "failed to record security alert");
        }
    }

    async fn resolve_identity(&self) -> AppResult<Identity> {
        with_timeout(
            self.network_timeout,
            "identity lookup",
            self.identity_resolver.resolve(),
        )
        .await
    }
}
