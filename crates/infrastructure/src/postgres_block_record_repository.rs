//! PostgreSQL-backed block records using the `ip_blocks` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use bulwark_application::BlockRecordRepository;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::{BlockRecord, Identity};

/// PostgreSQL implementation of the block record port.
#[derive(Clone)]
pub struct PostgresBlockRecordRepository {
    pool: PgPool,
}

impl PostgresBlockRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockRecordRepository for PostgresBlockRecordRepository {
    async fn find_active(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BlockRecord>> {
        let row = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT ip_address, blocked_until, reason, created_at
            FROM ip_blocks
            WHERE ip_address = $1 AND blocked_until > $2
            LIMIT 1
            "#,
        )
        .bind(identity.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to query ip block: {error}")))?;

        row.map(BlockRow::into_record).transpose()
    }

    async fn upsert(&self, record: BlockRecord) -> AppResult<()> {
        // One row per address: a new block window replaces the previous one.
        sqlx::query(
            r#"
            INSERT INTO ip_blocks (ip_address, blocked_until, reason, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (ip_address) DO UPDATE
            SET
                blocked_until = EXCLUDED.blocked_until,
                reason = EXCLUDED.reason,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(record.identity.as_str())
        .bind(record.blocked_until)
        .bind(record.reason)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert ip block: {error}")))?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct BlockRow {
    ip_address: String,
    blocked_until: DateTime<Utc>,
    reason: String,
    created_at: DateTime<Utc>,
}

impl BlockRow {
    fn into_record(self) -> AppResult<BlockRecord> {
        let identity = Identity::new(self.ip_address).map_err(|error| {
            AppError::Internal(format!("invalid ip_address stored in ip_blocks: {error}"))
        })?;

        Ok(BlockRecord {
            identity,
            blocked_until: self.blocked_until,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests;
