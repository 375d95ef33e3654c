use std::time::Duration as StdDuration;

use bulwark_core::AppError;
use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

pub async fn build_postgres_session_layer(
    pool: PgPool,
    cookie_secure: bool,
    idle_timeout: StdDuration,
) -> Result<SessionManagerLayer<PostgresStore>, AppError> {
    let session_store = PostgresStore::new(pool)
        .with_table_name("tower_sessions")
        .map_err(|error| {
            AppError::Validation(format!("invalid session table name configuration: {error}"))
        })?;

    session_store.migrate().await.map_err(|error| {
        AppError::Internal(format!("failed to initialize session store: {error}"))
    })?;

    Ok(configure(session_store, cookie_secure, idle_timeout))
}

pub fn build_memory_session_layer(
    cookie_secure: bool,
    idle_timeout: StdDuration,
) -> SessionManagerLayer<MemoryStore> {
    configure(MemoryStore::default(), cookie_secure, idle_timeout)
}

fn configure<S>(
    session_store: S,
    cookie_secure: bool,
    idle_timeout: StdDuration,
) -> SessionManagerLayer<S>
where
    S: SessionStore,
{
    let idle_seconds = i64::try_from(idle_timeout.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(session_store)
        .with_secure(cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(idle_seconds)))
}
