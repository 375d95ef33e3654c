use bulwark_application::ProtectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub live_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ProtectionStatusResponse {
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub request_count: usize,
    pub warning: bool,
}

impl From<ProtectionState> for ProtectionStatusResponse {
    fn from(value: ProtectionState) -> Self {
        Self {
            is_blocked: value.is_blocked,
            blocked_until: value.blocked_until,
            request_count: value.request_count,
            warning: value.warning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogRequestResponse {
    pub decision: &'static str,
    pub request_count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SecurityEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub details: Option<Value>,
}
