mod protection;
mod sessions;

use bulwark_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use protection::build_app_state;
pub use sessions::{build_memory_session_layer, build_postgres_session_layer};

pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
