//! Redis-backed sliding-window rate limiting.

use async_trait::async_trait;
use chrono::Utc;
use redis::Script;

use bulwark_application::RateLimitProcedure;
use bulwark_core::{AppError, AppResult};
use bulwark_domain::Identity;

const CHECK_RATE_LIMIT_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local max_attempts = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)

local count = redis.call('ZCARD', key)
if count >= max_attempts then
  return 0
end

redis.call('ZADD', key, now_ms, member)
redis.call('PEXPIRE', key, window_ms)
return 1
"#;

/// Redis implementation of the rate limit procedure port.
#[derive(Clone)]
pub struct RedisRateLimitProcedure {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRateLimitProcedure {
    /// Creates a procedure adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, identity: &Identity, action_type: &str) -> String {
        format!("{}:rate_limit:{action_type}:{identity}", self.key_prefix)
    }
}

#[async_trait]
impl RateLimitProcedure for RedisRateLimitProcedure {
    async fn check_rate_limit(
        &self,
        identity: &Identity,
        action_type: &str,
        max_attempts: u32,
        window_minutes: u32,
    ) -> AppResult<bool> {
        if max_attempts == 0 || window_minutes == 0 {
            return Err(AppError::Validation(
                "rate limit max_attempts and window_minutes must be greater than zero".to_owned(),
            ));
        }

        let window_ms = i64::from(window_minutes) * 60_000;
        let now_ms = Utc::now().timestamp_millis();
        let member = format!("{now_ms}-{}", uuid::Uuid::new_v4().simple());

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let allowed: i64 = Script::new(CHECK_RATE_LIMIT_SCRIPT)
            .key(self.key_for(identity, action_type))
            .arg(now_ms)
            .arg(window_ms)
            .arg(max_attempts)
            .arg(member)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to check redis rate limit: {error}"))
            })?;

        Ok(allowed == 1)
    }
}

#[cfg(test)]
mod tests {
    use bulwark_application::RateLimitProcedure;
    use bulwark_domain::Identity;

    use super::RedisRateLimitProcedure;

    fn identity(value: &str) -> Identity {
        match Identity::new(value) {
            Ok(identity) => identity,
            Err(error) => panic!("identity should be valid: {error}"),
        }
    }

    fn client(url: &str) -> redis::Client {
        match redis::Client::open(url) {
            Ok(client) => client,
            Err(error) => panic!("redis url should parse: {error}"),
        }
    }

    #[test]
    fn keys_are_scoped_by_prefix_action_and_identity() {
        let procedure = RedisRateLimitProcedure::new(client("redis://127.0.0.1/"), "bulwark");

        assert_eq!(
            procedure.key_for(&identity("203.0.113.5"), "contact_form"),
            "bulwark:rate_limit:contact_form:203.0.113.5"
        );
    }

    #[tokio::test]
    async fn zero_limits_are_rejected_before_connecting() {
        let procedure = RedisRateLimitProcedure::new(client("redis://127.0.0.1:1/"), "bulwark");

        let result = procedure
            .check_rate_limit(&identity("203.0.113.5"), "contact_form", 0, 15)
            .await;

        assert!(matches!(result, Err(bulwark_core::AppError::Validation(_))));
    }

    #[tokio::test]
    async fn sliding_window_denies_after_max_attempts() {
        let Ok(redis_url) = std::env::var("REDIS_URL") else {
            return;
        };

        let prefix = format!("bulwark-test-{}", uuid::Uuid::new_v4().simple());
        let procedure = RedisRateLimitProcedure::new(client(&redis_url), prefix);
        let caller = identity("198.51.100.20");

        let mut answers = Vec::new();
        for _ in 0..3 {
            answers.push(
                procedure
                    .check_rate_limit(&caller, "newsletter_signup", 2, 15)
                    .await
                    .unwrap_or_default(),
            );
        }

        assert_eq!(answers, vec![true, true, false]);
    }
}
