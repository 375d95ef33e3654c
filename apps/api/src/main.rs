//! Bulwark API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod protection_registry;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::time::Duration;

use bulwark_application::ScheduledTask;
use bulwark_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, ProtectionStoreConfig, init_tracing};

const SESSION_EVICTION_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = match &config.protection_store {
        ProtectionStoreConfig::Postgres { database_url } => {
            Some(api_services::connect_and_migrate(database_url).await?)
        }
        ProtectionStoreConfig::Memory => None,
    };

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let app_state = api_services::build_app_state(&config, pool.clone())?;

    let registry = app_state.protection_registry.clone();
    let _session_eviction = ScheduledTask::every(SESSION_EVICTION_PERIOD, move || {
        let registry = registry.clone();
        async move {
            registry.evict_idle().await;
        }
    });

    let app = match pool {
        Some(pool) => api_router::build_router(
            app_state,
            &config.frontend_url,
            api_services::build_postgres_session_layer(
                pool,
                config.cookie_secure,
                config.session_idle_timeout,
            )
            .await?,
        )?,
        None => api_router::build_router(
            app_state,
            &config.frontend_url,
            api_services::build_memory_session_layer(
                config.cookie_secure,
                config.session_idle_timeout,
            ),
        )?,
    };

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "bulwark-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
