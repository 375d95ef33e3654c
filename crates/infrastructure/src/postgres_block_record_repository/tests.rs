use bulwark_application::BlockRecordRepository;
use bulwark_domain::{BlockRecord, Identity, RATE_LIMIT_EXCEEDED_REASON};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresBlockRecordRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres ip block tests: {error}");
    }

    Some(pool)
}

fn unique_identity() -> Identity {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    match Identity::new(format!("test-{suffix}")) {
        Ok(identity) => identity,
        Err(error) => panic!("identity should be valid: {error}"),
    }
}

#[tokio::test]
async fn upsert_replaces_the_previous_block_window() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresBlockRecordRepository::new(pool);
    let identity = unique_identity();
    let now = Utc::now();

    let first = BlockRecord {
        identity: identity.clone(),
        blocked_until: now + Duration::minutes(5),
        reason: RATE_LIMIT_EXCEEDED_REASON.to_owned(),
        created_at: now,
    };
    let second = BlockRecord {
        blocked_until: now + Duration::minutes(15),
        ..first.clone()
    };

    assert!(repository.upsert(first).await.is_ok());
    assert!(repository.upsert(second).await.is_ok());

    let active = repository
        .find_active(&identity, now + Duration::minutes(10))
        .await;
    assert!(matches!(active, Ok(Some(ref record)) if record.reason == RATE_LIMIT_EXCEEDED_REASON));
}

#[tokio::test]
async fn expired_blocks_are_not_returned() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresBlockRecordRepository::new(pool);
    let identity = unique_identity();
    let now = Utc::now();

    let record = BlockRecord {
        identity: identity.clone(),
        blocked_until: now - Duration::minutes(1),
        reason: RATE_LIMIT_EXCEEDED_REASON.to_owned(),
        created_at: now - Duration::minutes(16),
    };
    assert!(repository.upsert(record).await.is_ok());

    assert!(matches!(
        repository.find_active(&identity, now).await,
        Ok(None)
    ));
}
