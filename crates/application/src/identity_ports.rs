use async_trait::async_trait;

use bulwark_core::AppResult;
use bulwark_domain::Identity;

/// Port resolving the caller's apparent network identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves the identity. Failures propagate to the caller, which decides
    /// how to degrade.
    async fn resolve(&self) -> AppResult<Identity>;
}
