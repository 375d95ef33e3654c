use async_trait::async_trait;
use bulwark_application::IdentityResolver;
use bulwark_core::AppResult;
use bulwark_domain::Identity;

/// Identity resolver returning an address already known to the caller,
/// such as the forwarded client address of an HTTP request.
#[derive(Debug, Clone)]
pub struct StaticIdentityResolver {
    identity: Identity,
}

impl StaticIdentityResolver {
    /// Creates a resolver that always returns `identity`.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self) -> AppResult<Identity> {
        Ok(self.identity.clone())
    }
}
