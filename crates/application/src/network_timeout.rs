use std::future::Future;
use std::time::Duration;

use bulwark_core::{AppError, AppResult};

/// Default limit applied to every collaborator call.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

/// Awaits `operation`, turning an elapsed `limit` into [`AppError::Unavailable`].
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    label: &str,
    operation: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Unavailable(format!(
            "{label} timed out after {} ms",
            limit.as_millis()
        ))),
    }
}
