use std::fmt::{Display, Formatter};
use std::time::Duration as StdDuration;

use bulwark_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Milliseconds in the per-minute counting window.
pub const MINUTE_WINDOW_MS: i64 = 60_000;

/// Milliseconds in the per-hour counting window and activity retention.
pub const HOUR_WINDOW_MS: i64 = 3_600_000;

/// Reason persisted on blocks issued by the abuse heuristic.
pub const RATE_LIMIT_EXCEEDED_REASON: &str = "Rate limit exceeded";

/// Caller identity, the apparent IP address reported for the caller.
///
/// This is best-effort data and not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(NonEmptyString);

impl Identity {
    /// Creates an identity from a reported address.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value: String = value.into();
        NonEmptyString::new(value.trim())
            .map(Self)
            .map_err(|_| AppError::Validation("identity must not be empty".to_owned()))
    }

    /// Returns the identity as stored in `ip_address` columns.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Identity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Outcome of evaluating one protected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbuseDecision {
    /// Request proceeds normally.
    Allow,
    /// Request proceeds but the caller should see a warning.
    Suspicious,
    /// Request is refused until the block expires.
    Block,
}

impl AbuseDecision {
    /// Returns a stable transport value for this decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Suspicious => "suspicious",
            Self::Block => "block",
        }
    }
}

/// Threshold configuration for the abuse heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseThresholds {
    max_requests_per_minute: u32,
    max_requests_per_hour: u32,
    suspicious_threshold: u32,
    block_duration_minutes: u32,
}

impl AbuseThresholds {
    /// Creates validated thresholds.
    pub fn new(
        max_requests_per_minute: u32,
        max_requests_per_hour: u32,
        suspicious_threshold: u32,
        block_duration_minutes: u32,
    ) -> AppResult<Self> {
        if max_requests_per_minute == 0
            || max_requests_per_hour == 0
            || suspicious_threshold == 0
            || block_duration_minutes == 0
        {
            return Err(AppError::Validation(
                "abuse thresholds must be greater than zero".to_owned(),
            ));
        }

        if suspicious_threshold > max_requests_per_minute {
            return Err(AppError::Validation(format!(
                "suspicious threshold {suspicious_threshold} exceeds per-minute maximum {max_requests_per_minute}"
            )));
        }

        Ok(Self {
            max_requests_per_minute,
            max_requests_per_hour,
            suspicious_threshold,
            block_duration_minutes,
        })
    }

    /// Returns the per-minute request ceiling.
    #[must_use]
    pub fn max_requests_per_minute(&self) -> u32 {
        self.max_requests_per_minute
    }

    /// Returns the per-hour request ceiling.
    #[must_use]
    pub fn max_requests_per_hour(&self) -> u32 {
        self.max_requests_per_hour
    }

    /// Returns the per-minute count above which activity is suspicious.
    #[must_use]
    pub fn suspicious_threshold(&self) -> u32 {
        self.suspicious_threshold
    }

    /// Returns the block duration in minutes.
    #[must_use]
    pub fn block_duration_minutes(&self) -> u32 {
        self.block_duration_minutes
    }

    /// Returns the block duration.
    #[must_use]
    pub fn block_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.block_duration_minutes))
    }

    /// Classifies observed counts. Every comparison is strict.
    #[must_use]
    pub fn classify(&self, per_minute: usize, per_hour: usize) -> AbuseDecision {
        if exceeds(per_minute, self.max_requests_per_minute)
            || exceeds(per_hour, self.max_requests_per_hour)
        {
            return AbuseDecision::Block;
        }

        if exceeds(per_minute, self.suspicious_threshold) {
            return AbuseDecision::Suspicious;
        }

        AbuseDecision::Allow
    }
}

impl Default for AbuseThresholds {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            max_requests_per_hour: 1000,
            suspicious_threshold: 40,
            block_duration_minutes: 15,
        }
    }
}

fn exceeds(count: usize, threshold: u32) -> bool {
    u64::try_from(count).unwrap_or(u64::MAX) > u64::from(threshold)
}

/// Persisted block for one identity. At most one is active per identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Blocked identity, persisted as `ip_address`.
    pub identity: Identity,
    /// Instant after which the block no longer applies.
    pub blocked_until: DateTime<Utc>,
    /// Human-readable reason.
    pub reason: String,
    /// Creation time of this block window.
    pub created_at: DateTime<Utc>,
}

impl BlockRecord {
    /// Builds the block issued when request thresholds are exceeded.
    #[must_use]
    pub fn rate_limit_exceeded(
        identity: Identity,
        now: DateTime<Utc>,
        thresholds: &AbuseThresholds,
    ) -> Self {
        Self {
            identity,
            blocked_until: now + thresholds.block_duration(),
            reason: RATE_LIMIT_EXCEEDED_REASON.to_owned(),
            created_at: now,
        }
    }

    /// Returns whether the block still applies at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until > now
    }

    /// Returns the time left on the block, clamped to zero.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> StdDuration {
        remaining_until(self.blocked_until, now)
    }
}

/// Returns `until - now` as a non-negative duration.
#[must_use]
pub fn remaining_until(until: DateTime<Utc>, now: DateTime<Utc>) -> StdDuration {
    (until - now).to_std().unwrap_or(StdDuration::ZERO)
}

/// Kind of security alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityAlertType {
    /// Request rate crossed the suspicious threshold.
    #[serde(rename = "DDoS_ATTEMPT")]
    DdosAttempt,
}

impl SecurityAlertType {
    /// Returns a stable storage value for this alert type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DdosAttempt => "DDoS_ATTEMPT",
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Worth a look.
    Medium,
    /// Likely abuse.
    High,
    /// Active attack.
    Critical,
}

impl AlertSeverity {
    /// Returns a stable storage value for this severity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Append-only security alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlert {
    /// Identity that triggered the alert.
    pub identity: Identity,
    /// Alert type, persisted as `type`.
    pub alert_type: SecurityAlertType,
    /// Alert severity.
    pub severity: AlertSeverity,
    /// Free-form detail payload.
    pub details: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl SecurityAlert {
    /// Builds the alert raised when per-minute traffic looks like a flood.
    #[must_use]
    pub fn ddos_attempt(identity: Identity, requests_per_minute: usize, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            alert_type: SecurityAlertType::DdosAttempt,
            severity: AlertSeverity::High,
            details: json!({ "requests_per_minute": requests_per_minute }),
            created_at: now,
        }
    }
}
