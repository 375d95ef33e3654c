//! Identity lookup through a public IP-echo endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use bulwark_application::IdentityResolver;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::Identity;

/// Endpoint answering `{"ip": "<address>"}` for the calling host.
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org?format=json";

/// Resolves the caller's public address by asking an IP-echo service.
///
/// The answer is only as trustworthy as the network path to the service.
#[derive(Clone)]
pub struct HttpIdentityResolver {
    http_client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct IpEchoResponse {
    ip: String,
}

impl HttpIdentityResolver {
    /// Creates a resolver querying `endpoint`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self) -> AppResult<Identity> {
        let response = self
            .http_client
            .get(self.endpoint.as_str())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("ip echo request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "ip echo endpoint returned status {}",
                response.status()
            )));
        }

        let body = response.json::<IpEchoResponse>().await.map_err(|error| {
            AppError::Internal(format!("invalid ip echo response body: {error}"))
        })?;

        Identity::new(body.ip)
    }
}
