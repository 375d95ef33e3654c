//! Application services and ports.

#![forbid(unsafe_code)]

mod abuse_heuristic_service;
mod activity_log;
mod block_status_service;
mod clock;
mod identity_ports;
mod network_timeout;
mod protection_session;
mod protection_state;
mod rate_limit_service;
mod scheduled_task;
mod security_event_service;

#[cfg(test)]
mod test_support;

pub use abuse_heuristic_service::{
    AbuseHeuristicService, BlockRecordRepository, SecurityAlertRepository,
};
pub use activity_log::{DEFAULT_ACTIVITY_LOG_KEY, KeyValueStore, LocalActivityLog};
pub use block_status_service::BlockStatusService;
pub use clock::Clock;
pub use identity_ports::IdentityResolver;
pub use network_timeout::DEFAULT_NETWORK_TIMEOUT;
pub use protection_session::{ProtectionDependencies, ProtectionSession, ProtectionSettings};
pub use protection_state::{ProtectionState, ProtectionStateHandle};
pub use rate_limit_service::{
    RateLimitProcedure, RateLimitRule, RateLimitService, RateLimitVerdict,
};
pub use scheduled_task::ScheduledTask;
pub use security_event_service::{SecurityEventRepository, SecurityEventService};
