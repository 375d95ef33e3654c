use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use bulwark_core::AppResult;
use bulwark_domain::BlockRecord;

use crate::network_timeout::{DEFAULT_NETWORK_TIMEOUT, with_timeout};
use crate::{BlockRecordRepository, Clock, IdentityResolver, ProtectionStateHandle};

/// Application service restoring a persisted block when a session starts.
#[derive(Clone)]
pub struct BlockStatusService {
    identity_resolver: Arc<dyn IdentityResolver>,
    block_repository: Arc<dyn BlockRecordRepository>,
    clock: Arc<dyn Clock>,
    state: ProtectionStateHandle,
    network_timeout: Duration,
}

impl BlockStatusService {
    /// Creates a checker writing into `state`.
    #[must_use]
    pub fn new(
        identity_resolver: Arc<dyn IdentityResolver>,
        block_repository: Arc<dyn BlockRecordRepository>,
        clock: Arc<dyn Clock>,
        state: ProtectionStateHandle,
    ) -> Self {
        Self {
            identity_resolver,
            block_repository,
            clock,
            state,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Overrides the limit applied to identity and datastore calls.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Looks up an active block for the caller and applies it locally.
    ///
    /// Returns whether the session is now blocked. Lookup failures leave the
    /// session unblocked.
    pub async fn check(&self) -> bool {
        match self.find_active_block().await {
            Ok(Some(record)) => {
                let now = self.clock.now();
                if !record.is_active_at(now) {
                    return false;
                }

                info!(
                    identity = %record.identity,
                    blocked_until = %record.blocked_until,
                    reason = %record.reason,
                    "restoring active block"
                );
                self.state.block_until(record.blocked_until, now);
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!(error = %error, "failed to check block status");
                false
            }
        }
    }

    async fn find_active_block(&self) -> AppResult<Option<BlockRecord>> {
        let identity = with_timeout(
            self.network_timeout,
            "identity lookup",
            self.identity_resolver.resolve(),
        )
        .await?;

        with_timeout(
            self.network_timeout,
            "block record query",
            self.block_repository.find_active(&identity, self.clock.now()),
        )
        .await
    }
}
