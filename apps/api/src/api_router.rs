mod cors;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use bulwark_core::AppError;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router<S>(
    app_state: AppState,
    frontend_url: &str,
    session_layer: SessionManagerLayer<S>,
) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    let protection_routes = Router::new()
        .route(
            "/api/protection/status",
            get(handlers::protection::protection_status_handler),
        )
        .route(
            "/api/protection/requests",
            post(handlers::protection::log_request_handler),
        )
        .route(
            "/api/protection/rate-limit/{action}",
            post(handlers::protection::rate_limit_handler),
        )
        .route(
            "/api/security/events",
            post(handlers::security_events::security_event_handler),
        )
        .route_layer(from_fn(middleware::attach_request_context));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protection_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .layer(session_layer)
        .with_state(app_state))
}
