use async_trait::async_trait;
use sqlx::PgPool;

use bulwark_application::SecurityAlertRepository;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::SecurityAlert;

/// PostgreSQL-backed repository for security alerts.
#[derive(Clone)]
pub struct PostgresSecurityAlertRepository {
    pool: PgPool,
}

impl PostgresSecurityAlertRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAlertRepository for PostgresSecurityAlertRepository {
    async fn append_alert(&self, alert: SecurityAlert) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_alerts (type, severity, ip_address, details, created_at)
            VALUES ($1, $2, $3, $4::jsonb, $5)
            "#,
        )
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.identity.as_str())
        .bind(alert.details.to_string())
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append security alert: {error}")))?;

        Ok(())
    }
}
