//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod protection;
mod security_event;

pub use protection::{
    AbuseDecision, AbuseThresholds, AlertSeverity, BlockRecord, HOUR_WINDOW_MS, Identity,
    MINUTE_WINDOW_MS, RATE_LIMIT_EXCEEDED_REASON, SecurityAlert, SecurityAlertType,
    remaining_until,
};
pub use security_event::{SecurityEvent, SecurityEventType};
