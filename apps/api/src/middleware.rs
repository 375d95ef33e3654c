use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use bulwark_core::AppError;
use bulwark_domain::Identity;
use tower_sessions::Session;

use crate::error::ApiResult;

/// Session entry holding the key of the caller's protection session.
pub const SESSION_PROTECTION_KEY: &str = "protection_key";

/// Caller details attached to every request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_key: String,
    pub identity: Option<Identity>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn require_identity(&self) -> Result<&Identity, AppError> {
        self.identity.as_ref().ok_or_else(|| {
            AppError::Validation("client address could not be determined".to_owned())
        })
    }
}

pub async fn attach_request_context(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let session_key = match session
        .get::<String>(SESSION_PROTECTION_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session: {error}")))?
    {
        Some(session_key) => session_key,
        None => {
            let session_key = uuid::Uuid::new_v4().to_string();
            session
                .insert(SESSION_PROTECTION_KEY, &session_key)
                .await
                .map_err(|error| AppError::Internal(format!("failed to write session: {error}")))?;
            session_key
        }
    };

    let peer_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());
    let context = request_context(request.headers(), peer_address, session_key);

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Builds the context from the first `X-Forwarded-For` entry, falling back to
/// the peer address.
pub fn request_context(
    headers: &HeaderMap,
    peer_address: Option<IpAddr>,
    session_key: String,
) -> RequestContext {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let identity = forwarded
        .or_else(|| peer_address.map(|address| address.to_string()))
        .and_then(|address| Identity::new(address).ok());

    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    RequestContext {
        session_key,
        identity,
        user_agent,
    }
}
