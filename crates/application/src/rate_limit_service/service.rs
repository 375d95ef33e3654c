use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use bulwark_core::{AppError, AppResult};

use crate::IdentityResolver;
use crate::network_timeout::{DEFAULT_NETWORK_TIMEOUT, with_timeout};

use super::config::RateLimitRule;
use super::ports::RateLimitProcedure;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateLimitVerdict {
    /// The action may proceed.
    Allowed,
    /// The action must not proceed; `message` is shown to the caller.
    Denied {
        /// User-facing explanation naming the wait time.
        message: String,
    },
}

impl RateLimitVerdict {
    /// Returns whether the action may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Converts a denial into [`AppError::RateLimited`].
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied { message } => Err(AppError::RateLimited(message)),
        }
    }
}

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    identity_resolver: Arc<dyn IdentityResolver>,
    procedure: Arc<dyn RateLimitProcedure>,
    network_timeout: Duration,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(
        identity_resolver: Arc<dyn IdentityResolver>,
        procedure: Arc<dyn RateLimitProcedure>,
    ) -> Self {
        Self {
            identity_resolver,
            procedure,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Overrides the limit applied to identity and procedure calls.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Checks whether the caller may perform `rule.action()` now.
    ///
    /// Evaluated fresh on every call. Errors and timeouts allow the action.
    pub async fn check_rate_limit(&self, rule: &RateLimitRule) -> RateLimitVerdict {
        match self.call_procedure(rule).await {
            Ok(true) => RateLimitVerdict::Allowed,
            Ok(false) => {
                warn!(
                    action = %rule.action(),
                    max_attempts = rule.max_attempts(),
                    window_minutes = rule.window_minutes(),
                    "rate limit exceeded"
                );
                RateLimitVerdict::Denied {
                    message: rule.denial_message(),
                }
            }
            Err(error) => {
                warn!(action = %rule.action(), error = %error, "rate limit check failed, allowing");
                RateLimitVerdict::Allowed
            }
        }
    }

    async fn call_procedure(&self, rule: &RateLimitRule) -> AppResult<bool> {
        let identity = with_timeout(
            self.network_timeout,
            "identity lookup",
            self.identity_resolver.resolve(),
        )
        .await?;

        with_timeout(
            self.network_timeout,
            "rate limit procedure",
            self.procedure.check_rate_limit(
                &identity,
                rule.action(),
                rule.max_attempts(),
                rule.window_minutes(),
            ),
        )
        .await
    }
}
