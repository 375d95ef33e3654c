use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bulwark_core::AppResult;
use bulwark_domain::{BlockRecord, Identity, SecurityAlert};

/// Repository port for the persisted IP block table.
#[async_trait]
pub trait BlockRecordRepository: Send + Sync {
    /// Returns the block for `identity` whose `blocked_until` is after `now`.
    async fn find_active(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BlockRecord>>;

    /// Inserts or overwrites the block for the record's identity.
    async fn upsert(&self, record: BlockRecord) -> AppResult<()>;
}

/// Repository port for security alerts.
#[async_trait]
pub trait SecurityAlertRepository: Send + Sync {
    /// Appends an alert.
    async fn append_alert(&self, alert: SecurityAlert) -> AppResult<()>;
}
