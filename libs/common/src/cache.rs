//! Redis cache module for the Larder services
//!
//! Holds auth sessions, the refresh token blacklist and the signed image URL
//! cache. Every key is stored under a namespace so the services can share one
//! Redis database.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Prefix prepended to every key
    pub namespace: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_NAMESPACE`: Key prefix (default: "larder")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let namespace = std::env::var("REDIS_NAMESPACE").unwrap_or_else(|_| "larder".to_string());

        Ok(RedisConfig { url, namespace })
    }
}

/// Namespaced Redis cache over a multiplexed connection
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    namespace: String,
}

impl RedisCache {
    /// Open a Redis client for the configured URL
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisCache {
            client,
            namespace: config.namespace.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Set a value with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        let key = self.key(key);

        match ttl_seconds {
            Some(ttl) => {
                let _: () = conn.set_ex(&key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(&key, value).await?;
            }
        }

        debug!("cache set {}", key);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let found: bool = conn.exists(self.key(key)).await?;
        Ok(found)
    }

    /// Delete keys, ignoring ones that do not exist
    pub async fn delete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let _: u64 = conn.del(keys).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
