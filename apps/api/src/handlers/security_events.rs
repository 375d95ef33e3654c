use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use bulwark_core::AppError;
use bulwark_domain::SecurityEventType;
use serde_json::json;

use crate::dto::SecurityEventRequest;
use crate::error::ApiResult;
use crate::middleware::RequestContext;
use crate::state::AppState;

pub async fn security_event_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<SecurityEventRequest>,
) -> ApiResult<StatusCode> {
    let event_type = payload.event_type.trim();
    if event_type.is_empty() {
        return Err(AppError::Validation("event_type must not be empty".to_owned()).into());
    }

    state
        .security_event_service
        .for_caller(context.user_agent, context.identity)
        .log_event(
            SecurityEventType::from_transport(event_type),
            payload.details.unwrap_or_else(|| json!({})),
        )
        .await;

    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::{Extension, Json};
    use bulwark_application::ProtectionSettings;
    use bulwark_domain::SecurityEventType;
    use serde_json::json;

    use crate::dto::SecurityEventRequest;
    use crate::middleware::RequestContext;
    use crate::test_support::{loopback, memory_state};

    use super::security_event_handler;

    fn context() -> Extension<RequestContext> {
        Extension(RequestContext {
            session_key: "tab-1".to_owned(),
            identity: Some(loopback()),
            user_agent: Some("Mozilla/5.0".to_owned()),
        })
    }

    #[tokio::test]
    async fn event_is_stored_with_caller_details() {
        let (state, repository) = memory_state(ProtectionSettings::default());

        let status = security_event_handler(
            State(state),
            context(),
            Json(SecurityEventRequest {
                event_type: "unauthorized_access".to_owned(),
                details: Some(json!({ "resource": "/admin" })),
            }),
        )
        .await;

        assert!(status.is_ok_and(|code| code == StatusCode::ACCEPTED));
        let events = repository.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::UnauthorizedAccess);
        assert_eq!(events[0].user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(events[0].identity, Some(loopback()));
    }

    #[tokio::test]
    async fn unknown_types_are_kept_and_details_default_to_empty() {
        let (state, repository) = memory_state(ProtectionSettings::default());

        let status = security_event_handler(
            State(state),
            context(),
            Json(SecurityEventRequest {
                event_type: "paywall_bypass".to_owned(),
                details: None,
            }),
        )
        .await;

        assert!(status.is_ok_and(|code| code == StatusCode::ACCEPTED));
        let events = repository.events().await;
        assert_eq!(events[0].event_type.as_str(), "paywall_bypass");
        assert_eq!(events[0].details, json!({}));
    }

    #[tokio::test]
    async fn blank_event_type_is_rejected() {
        let (state, repository) = memory_state(ProtectionSettings::default());

        let status = security_event_handler(
            State(state),
            context(),
            Json(SecurityEventRequest {
                event_type: "  ".to_owned(),
                details: None,
            }),
        )
        .await;

        assert!(status.is_err());
        assert!(repository.events().await.is_empty());
    }
}
