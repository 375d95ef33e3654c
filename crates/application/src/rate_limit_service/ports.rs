use async_trait::async_trait;

use bulwark_core::AppResult;
use bulwark_domain::Identity;

/// Port for the datastore's sliding-window rate limit procedure.
#[async_trait]
pub trait RateLimitProcedure: Send + Sync {
    /// Records an attempt for `(identity, action_type)` and returns whether it
    /// is allowed within `window_minutes`.
    async fn check_rate_limit(
        &self,
        identity: &Identity,
        action_type: &str,
        max_attempts: u32,
        window_minutes: u32,
    ) -> AppResult<bool>;
}
