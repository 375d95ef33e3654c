use axum::extract::{Path, State};
use axum::{Extension, Json};
use bulwark_application::ProtectionState;
use bulwark_core::AppError;
use bulwark_domain::{AbuseDecision, remaining_until};
use chrono::{DateTime, Utc};

use crate::dto::{LogRequestResponse, ProtectionStatusResponse, RateLimitResponse};
use crate::error::ApiResult;
use crate::middleware::RequestContext;
use crate::state::AppState;

pub async fn protection_status_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<ProtectionStatusResponse>> {
    let session = state
        .protection_registry
        .session_for(&context.session_key, context.require_identity()?)
        .await;

    Ok(Json(session.refresh().await.into()))
}

pub async fn log_request_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<LogRequestResponse>> {
    let session = state
        .protection_registry
        .session_for(&context.session_key, context.require_identity()?)
        .await;

    let decision = session.log_request().await;
    let snapshot = session.state();

    let message = match decision {
        AbuseDecision::Block => {
            let now = state.protection_registry.now();
            return Err(AppError::RateLimited(blocked_message(&snapshot, now)).into());
        }
        AbuseDecision::Suspicious => Some(
            "Unusual activity detected from your connection. Please slow down.".to_owned(),
        ),
        AbuseDecision::Allow => None,
    };

    Ok(Json(LogRequestResponse {
        decision: decision.as_str(),
        request_count: snapshot.request_count,
        message,
    }))
}

pub async fn rate_limit_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(action): Path<String>,
) -> ApiResult<Json<RateLimitResponse>> {
    let session = state
        .protection_registry
        .session_for(&context.session_key, context.require_identity()?)
        .await;

    session.check_rate_limit(&action).await?.into_result()?;

    Ok(Json(RateLimitResponse { allowed: true }))
}

fn blocked_message(snapshot: &ProtectionState, now: DateTime<Utc>) -> String {
    let remaining_minutes = snapshot
        .blocked_until
        .map(|until| remaining_until(until, now).as_secs().div_ceil(60))
        .filter(|minutes| *minutes > 0);

    match remaining_minutes {
        Some(1) => "Too many requests. Access is temporarily blocked, please try again in 1 minute."
            .to_owned(),
        Some(minutes) => format!(
            "Too many requests. Access is temporarily blocked, please try again in {minutes} minutes."
        ),
        None => "Too many requests. Access is temporarily blocked, please try again later."
            .to_owned(),
    }
}
