//! Maintenance flag storage
//!
//! Maintenance mode and the system banner message live in Redis so every
//! process sees the same flags without touching the catalog. Values are
//! plain strings with a time to live; an expired key means the flag is
//! clear.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use wrack_core::{Config, Result, WrackError};

/// Key holding the maintenance lock text
pub const MAINTENANCE_KEY: &str = "maintenance";

/// Key holding the system banner message
pub const SYSMESSAGE_KEY: &str = "sysmessage";

/// Key under which an API access token is stored
pub fn oauth_token_key(token: &str) -> String {
    format!("oauth:{}", token)
}

/// Flag storage operations, backed by Redis in production.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Cheap connectivity check, used at startup.
    async fn ping(&self) -> Result<()>;

    /// Set `key` to `value`, expiring after `ttl_seconds`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remaining time to live of `key` in seconds.
    ///
    /// `None` when the key does not exist or carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

fn kv_unavailable(err: redis::RedisError) -> WrackError {
    WrackError::KeyValueUnavailable(err.to_string())
}

fn kv_err(err: redis::RedisError) -> WrackError {
    WrackError::KeyValue(err.to_string())
}

/// Production flag storage on Redis.
#[derive(Clone)]
pub struct RedisKv {
    manager: ConnectionManager,
}

impl RedisKv {
    /// Connect to the Redis instance named in the config.
    ///
    /// Fails fast when the instance is unreachable so callers can refuse
    /// to start instead of failing on first use.
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = format!(
            "redis://{}:{}/{}",
            config.redis.host, config.redis.port, config.redis.db
        );
        let client = redis::Client::open(url).map_err(kv_unavailable)?;
        let manager = ConnectionManager::new(client).await.map_err(kv_unavailable)?;
        Ok(Self { manager })
    }

    // ConnectionManager is a cheap handle around one multiplexed
    // connection; commands need it mutably.
    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisKv {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(kv_unavailable)?;
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(kv_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await.map_err(kv_err)?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.conn();
        // Redis reports -2 for a missing key and -1 for no expiry.
        let remaining: i64 = conn.ttl(key).await.map_err(kv_err)?;
        if remaining < 0 {
            Ok(None)
        } else {
            Ok(Some(remaining as u64))
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await.map_err(kv_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> Config {
        Config::from_toml(
            r#"
            [main]
            test_environment = true
            working_dir = "/tmp/wrack-work"

            [postgres]
            user = "postgres"
            database = "wrack_test"

            [ebi]
            dropbox_url = "https://dropbox.example.org/upload"
            center_name = "CCME-COLORADO"
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis instance on localhost:6379
    async fn test_flag_round_trip_against_live_redis() {
        let kv = RedisKv::connect(&live_config()).await.unwrap();
        kv.ping().await.unwrap();

        let key = "wrack:test:flag-round-trip";
        kv.set_with_expiry(key, "down for upgrades", 60).await.unwrap();

        assert_eq!(
            kv.get(key).await.unwrap().as_deref(),
            Some("down for upgrades")
        );
        let ttl = kv.ttl(key).await.unwrap().unwrap();
        assert!(ttl > 0 && ttl <= 60);

        kv.delete(key).await.unwrap();
        assert_eq!(kv.get(key).await.unwrap(), None);
        assert_eq!(kv.ttl(key).await.unwrap(), None);
    }
}
