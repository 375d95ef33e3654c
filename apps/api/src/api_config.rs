use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use bulwark_application::{ProtectionSettings, RateLimitRule};
use bulwark_core::{AppError, AppResult};
use bulwark_domain::AbuseThresholds;
use tracing_subscriber::EnvFilter;

/// Where blocks, alerts and audit events are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionStoreConfig {
    Postgres { database_url: String },
    Memory,
}

impl ProtectionStoreConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory => "memory",
        }
    }
}

/// Backend answering named-action rate limit checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// The `check_rate_limit` procedure of the protection store.
    Postgres,
    Redis,
}

/// Storage behind per-session activity logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLogStore {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: String,
    pub protection_store: ProtectionStoreConfig,
    pub rate_limit_backend: RateLimitBackend,
    pub activity_log_store: ActivityLogStore,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub cookie_secure: bool,
    pub protection_settings: ProtectionSettings,
    pub session_idle_timeout: Duration,
    pub max_sessions: usize,
}

impl ApiConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let env = EnvReader { lookup };

        let api_host = env.or("API_HOST", "127.0.0.1");
        let api_port = env.parsed::<u16>("API_PORT", 3001)?;
        let frontend_url = env.or("FRONTEND_URL", "http://localhost:3000");

        let protection_store = match env.or("PROTECTION_STORE", "postgres").as_str() {
            "postgres" => ProtectionStoreConfig::Postgres {
                database_url: env.required_non_empty("DATABASE_URL")?,
            },
            "memory" => ProtectionStoreConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "PROTECTION_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let rate_limit_backend = match env.or("RATE_LIMIT_BACKEND", "postgres").as_str() {
            "postgres" => RateLimitBackend::Postgres,
            "redis" => RateLimitBackend::Redis,
            other => {
                return Err(AppError::Validation(format!(
                    "RATE_LIMIT_BACKEND must be either 'postgres' or 'redis', got '{other}'"
                )));
            }
        };

        let activity_log_store = match env.or("ACTIVITY_LOG_STORE", "memory").as_str() {
            "memory" => ActivityLogStore::Memory,
            "redis" => ActivityLogStore::Redis,
            other => {
                return Err(AppError::Validation(format!(
                    "ACTIVITY_LOG_STORE must be either 'memory' or 'redis', got '{other}'"
                )));
            }
        };

        let redis_required = rate_limit_backend == RateLimitBackend::Redis
            || activity_log_store == ActivityLogStore::Redis;
        let redis_url = if redis_required {
            Some(env.required_non_empty("REDIS_URL")?)
        } else {
            env.optional("REDIS_URL")
        };
        if migrate_only && !matches!(protection_store, ProtectionStoreConfig::Postgres { .. }) {
            return Err(AppError::Validation(
                "migrate requires PROTECTION_STORE=postgres".to_owned(),
            ));
        }

        let thresholds = AbuseThresholds::new(
            env.parsed("DDOS_MAX_REQUESTS_PER_MINUTE", 60)?,
            env.parsed("DDOS_MAX_REQUESTS_PER_HOUR", 1000)?,
            env.parsed("DDOS_SUSPICIOUS_THRESHOLD", 40)?,
            env.parsed("DDOS_BLOCK_DURATION_MINUTES", 15)?,
        )?;

        let rate_limit_max_attempts =
            env.parsed("RATE_LIMIT_MAX_ATTEMPTS", RateLimitRule::DEFAULT_MAX_ATTEMPTS)?;
        let rate_limit_window_minutes =
            env.parsed("RATE_LIMIT_WINDOW_MINUTES", RateLimitRule::DEFAULT_WINDOW_MINUTES)?;
        // Reject invalid limits at startup.
        RateLimitRule::new(
            "startup_check",
            rate_limit_max_attempts,
            rate_limit_window_minutes,
        )?;

        let network_timeout_ms = env.parsed::<u64>("PROTECTION_NETWORK_TIMEOUT_MS", 5_000)?;
        if network_timeout_ms == 0 {
            return Err(AppError::Validation(
                "PROTECTION_NETWORK_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        let idle_minutes = env.parsed::<u64>("PROTECTION_SESSION_IDLE_MINUTES", 30)?;
        if idle_minutes == 0 {
            return Err(AppError::Validation(
                "PROTECTION_SESSION_IDLE_MINUTES must be greater than zero".to_owned(),
            ));
        }

        let max_sessions = env.parsed::<usize>("PROTECTION_MAX_SESSIONS", 10_000)?;
        if max_sessions == 0 {
            return Err(AppError::Validation(
                "PROTECTION_MAX_SESSIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            frontend_url,
            protection_store,
            rate_limit_backend,
            activity_log_store,
            redis_url,
            redis_key_prefix: env.or("REDIS_KEY_PREFIX", "bulwark"),
            cookie_secure: env.or("SESSION_COOKIE_SECURE", "false").eq_ignore_ascii_case("true"),
            protection_settings: ProtectionSettings {
                thresholds,
                rate_limit_max_attempts,
                rate_limit_window_minutes,
                network_timeout: Duration::from_millis(network_timeout_ms),
                ..ProtectionSettings::default()
            },
            session_idle_timeout: Duration::from_secs(idle_minutes * 60),
            max_sessions,
        })
    }

    pub fn socket_address(&self) -> AppResult<SocketAddr> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_owned())
    }

    fn required_non_empty(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parsed<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
            None => Ok(default),
        }
    }
}
