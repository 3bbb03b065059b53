use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("key not found")]
    NotFound,
}

/// Small async key/value abstraction over refresh-token storage. Kept as a
/// trait so auth wiring in `server` never depends on the `redis` crate
/// directly.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError>;
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), TokenStoreError>;
    async fn get(&self, key: &str) -> Result<String, TokenStoreError>;
    async fn delete(&self, key: &str) -> Result<(), TokenStoreError>;
}

pub struct RedisTokenStore {
    conn: ConnectionManager,
}

impl RedisTokenStore {
    pub async fn connect(redis_url: &str) -> Result<Self, TokenStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisTokenStore { conn })
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        self.conn.clone().set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), TokenStoreError> {
        self.conn
            .clone()
            .set_ex::<_, _, ()>(key, value, ttl.as_secs() as usize)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, TokenStoreError> {
        let value: Option<String> = self.conn.clone().get(key).await?;
        value.ok_or(TokenStoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), TokenStoreError> {
        self.conn.clone().del::<_, ()>(key).await?;
        Ok(())
    }
}
