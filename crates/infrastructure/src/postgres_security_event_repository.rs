use async_trait::async_trait;
use sqlx::PgPool;

use bulwark_application::SecurityEventRepository;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::SecurityEvent;

/// PostgreSQL-backed repository for the security audit log.
#[derive(Clone)]
pub struct PostgresSecurityEventRepository {
    pool: PgPool,
}

impl PostgresSecurityEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityEventRepository for PostgresSecurityEventRepository {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_logs (
                event_type,
                details,
                user_agent,
                ip_address,
                created_at
            )
            VALUES ($1, $2::jsonb, $3, $4, $5)
            "#,
        )
        .bind(event.event_type.as_str())
        .bind(event.details.to_string())
        .bind(event.user_agent)
        .bind(event.identity.map(|identity| identity.as_str().to_owned()))
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append security event: {error}")))?;

        Ok(())
    }
}
