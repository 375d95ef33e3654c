use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Identity;

/// Stable security event categories written to the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    /// Access to a resource was refused.
    UnauthorizedAccess,
    /// An administrator changed content or settings.
    AdminAction,
    /// A sign-in was attempted.
    LoginAttempt,
    /// Protected data was read or written.
    DataAccess,
    /// A security rule was broken.
    SecurityViolation,
    /// Caller-defined event type.
    Other(String),
}

impl SecurityEventType {
    /// Returns a stable storage value for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::AdminAction => "admin_action",
            Self::LoginAttempt => "login_attempt",
            Self::DataAccess => "data_access",
            Self::SecurityViolation => "security_violation",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Parses a transport value, keeping unknown values as [`Self::Other`].
    #[must_use]
    pub fn from_transport(value: &str) -> Self {
        match value {
            "unauthorized_access" => Self::UnauthorizedAccess,
            "admin_action" => Self::AdminAction,
            "login_attempt" => Self::LoginAttempt,
            "data_access" => Self::DataAccess,
            "security_violation" => Self::SecurityViolation,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event category.
    pub event_type: SecurityEventType,
    /// Free-form JSON details.
    pub details: Value,
    /// Caller user-agent if known.
    pub user_agent: Option<String>,
    /// Caller identity if known.
    pub identity: Option<Identity>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
