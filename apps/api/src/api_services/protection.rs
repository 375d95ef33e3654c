use std::sync::Arc;
use std::time::Duration;

use bulwark_application::{
    BlockRecordRepository, Clock, KeyValueStore, ProtectionDependencies, RateLimitProcedure,
    SecurityAlertRepository, SecurityEventRepository, SecurityEventService,
};
use bulwark_core::AppError;
use bulwark_domain::Identity;
use bulwark_infrastructure::{
    InMemoryKeyValueStore, InMemoryProtectionRepository, PostgresBlockRecordRepository,
    PostgresRateLimitProcedure, PostgresSecurityAlertRepository, PostgresSecurityEventRepository,
    RedisKeyValueStore, RedisRateLimitProcedure, StaticIdentityResolver, SystemClock,
};
use sqlx::PgPool;
use tracing::info;

use crate::api_config::{ActivityLogStore, ApiConfig, RateLimitBackend};
use crate::protection_registry::ProtectionRegistry;
use crate::state::AppState;

/// Expiry of persisted activity logs, longer than the hourly window.
const ACTIVITY_LOG_TTL: Duration = Duration::from_secs(2 * 60 * 60);

const UNRESOLVED_ADDRESS: &str = "0.0.0.0";

struct StoreAdapters {
    blocks: Arc<dyn BlockRecordRepository>,
    alerts: Arc<dyn SecurityAlertRepository>,
    events: Arc<dyn SecurityEventRepository>,
    procedure: Arc<dyn RateLimitProcedure>,
}

impl StoreAdapters {
    fn postgres(pool: PgPool) -> Self {
        Self {
            blocks: Arc::new(PostgresBlockRecordRepository::new(pool.clone())),
            alerts: Arc::new(PostgresSecurityAlertRepository::new(pool.clone())),
            events: Arc::new(PostgresSecurityEventRepository::new(pool.clone())),
            procedure: Arc::new(PostgresRateLimitProcedure::new(pool)),
        }
    }

    fn memory(clock: Arc<dyn Clock>) -> Self {
        let repository = Arc::new(InMemoryProtectionRepository::new(clock));
        Self {
            blocks: repository.clone(),
            alerts: repository.clone(),
            events: repository.clone(),
            procedure: repository,
        }
    }
}

pub fn build_app_state(config: &ApiConfig, pool: Option<PgPool>) -> Result<AppState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = config.protection_settings.clone();

    let redis_client = config
        .redis_url
        .as_deref()
        .map(|redis_url| {
            redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))
        })
        .transpose()?;
    let require_redis = || {
        redis_client
            .clone()
            .ok_or_else(|| AppError::Validation("REDIS_URL is required".to_owned()))
    };

    let adapters = match pool {
        Some(pool) => StoreAdapters::postgres(pool),
        None => StoreAdapters::memory(clock.clone()),
    };

    let rate_limit_procedure: Arc<dyn RateLimitProcedure> = match config.rate_limit_backend {
        RateLimitBackend::Postgres => adapters.procedure,
        RateLimitBackend::Redis => Arc::new(RedisRateLimitProcedure::new(
            require_redis()?,
            config.redis_key_prefix.clone(),
        )),
    };

    let key_value_store: Arc<dyn KeyValueStore> = match config.activity_log_store {
        ActivityLogStore::Memory => Arc::new(InMemoryKeyValueStore::new()),
        ActivityLogStore::Redis => Arc::new(RedisKeyValueStore::new(
            require_redis()?,
            config.redis_key_prefix.clone(),
            ACTIVITY_LOG_TTL,
        )),
    };

    info!(
        store = config.protection_store.name(),
        rate_limit_backend = ?config.rate_limit_backend,
        activity_log_store = ?config.activity_log_store,
        "protection adapters configured"
    );

    // Placeholder only. Every session resolves to its request's client address.
    let identity_resolver = Arc::new(StaticIdentityResolver::new(Identity::new(
        UNRESOLVED_ADDRESS,
    )?));

    let dependencies = ProtectionDependencies {
        identity_resolver,
        block_repository: adapters.blocks,
        alert_repository: adapters.alerts,
        rate_limit_procedure,
        key_value_store,
        clock: clock.clone(),
    };

    let security_event_service = SecurityEventService::new(adapters.events, clock)
        .with_network_timeout(settings.network_timeout);

    Ok(AppState {
        protection_registry: Arc::new(ProtectionRegistry::new(
            dependencies,
            settings,
            config.session_idle_timeout,
            config.max_sessions,
        )),
        security_event_service,
    })
}
