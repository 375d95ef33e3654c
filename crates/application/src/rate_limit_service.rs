//! Server-authoritative rate limiting for named actions.
//!
//! Each check is a single call to the datastore's sliding-window procedure,
//! keyed by the caller's identity and the action name. Infrastructure
//! failures allow the action.

mod config;
mod ports;
mod service;


pub use config::RateLimitRule;
pub use ports::RateLimitProcedure;
pub use service::{RateLimitService, RateLimitVerdict};
