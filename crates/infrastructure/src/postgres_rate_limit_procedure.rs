//! Rate limiting through the `check_rate_limit` stored procedure.

use async_trait::async_trait;
use sqlx::PgPool;

use bulwark_application::RateLimitProcedure;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::Identity;

/// PostgreSQL implementation of the rate limit procedure port.
#[derive(Clone)]
pub struct PostgresRateLimitProcedure {
    pool: PgPool,
}

impl PostgresRateLimitProcedure {
    /// Creates a procedure adapter with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitProcedure for PostgresRateLimitProcedure {
    async fn check_rate_limit(
        &self,
        identity: &Identity,
        action_type: &str,
        max_attempts: u32,
        window_minutes: u32,
    ) -> AppResult<bool> {
        let max_attempts = i32::try_from(max_attempts).map_err(|error| {
            AppError::Validation(format!("invalid rate limit max_attempts: {error}"))
        })?;
        let window_minutes = i32::try_from(window_minutes).map_err(|error| {
            AppError::Validation(format!("invalid rate limit window_minutes: {error}"))
        })?;

        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT check_rate_limit(
                identity => $1,
                action_type => $2,
                max_attempts => $3,
                window_minutes => $4
            )
            "#,
        )
        .bind(identity.as_str())
        .bind(action_type)
        .bind(max_attempts)
        .bind(window_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check rate limit: {error}")))?;

        Ok(allowed)
    }
}
