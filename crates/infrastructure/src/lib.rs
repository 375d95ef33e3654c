//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_identity_resolver;
mod in_memory_key_value_store;
mod in_memory_protection_repository;
mod postgres_block_record_repository;
mod postgres_rate_limit_procedure;
mod postgres_security_alert_repository;
mod postgres_security_event_repository;
mod redis_key_value_store;
mod redis_rate_limit_procedure;
mod static_identity_resolver;
mod system_clock;

pub use http_identity_resolver::{DEFAULT_IP_ECHO_URL, HttpIdentityResolver};
pub use in_memory_key_value_store::InMemoryKeyValueStore;
pub use in_memory_protection_repository::InMemoryProtectionRepository;
pub use postgres_block_record_repository::PostgresBlockRecordRepository;
pub use postgres_rate_limit_procedure::PostgresRateLimitProcedure;
pub use postgres_security_alert_repository::PostgresSecurityAlertRepository;
pub use postgres_security_event_repository::PostgresSecurityEventRepository;
pub use redis_key_value_store::RedisKeyValueStore;
pub use redis_rate_limit_procedure::RedisRateLimitProcedure;
pub use static_identity_resolver::StaticIdentityResolver;
pub use system_clock::SystemClock;
