use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use bulwark_application::KeyValueStore;
use bulwark_core::{AppError, AppResult};

/// Redis implementation of the activity log store.
///
/// Values expire after `ttl` so abandoned sessions do not accumulate.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    client: redis::Client,
    key_prefix: String,
    ttl: Duration,
}

impl RedisKeyValueStore {
    /// Creates a store with a configured Redis client, key prefix and expiry.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut connection = self.connection().await?;
        connection
            .get::<_, Option<Vec<u8>>>(self.key_for(key))
            .await
            .map_err(|error| AppError::Internal(format!("failed to read redis key: {error}")))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> AppResult<()> {
        let mut connection = self.connection().await?;
        connection
            .set_ex::<_, _, ()>(self.key_for(key), value, self.ttl.as_secs().max(1))
            .await
            .map_err(|error| AppError::Internal(format!("failed to write redis key: {error}")))
    }
}
