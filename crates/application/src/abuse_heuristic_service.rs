//! Client-session DDoS heuristic.
//!
//! Counts the session's own requests against per-minute, per-hour and
//! suspicious thresholds. Breaches persist a block for the caller's identity,
//! suspicious bursts append a security alert.

mod ports;
mod service;


pub use ports::{BlockRecordRepository, SecurityAlertRepository};
pub use service::AbuseHeuristicService;
