use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::config::Config;

/// Redis-backed JSON cache. Built without a connection when Redis is not
/// configured; every read then misses and every write is a no-op.
#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
    prefix: String,
}

impl Cache {
    pub async fn new(config: &Config) -> Result<Self, redis::RedisError> {
        let prefix = config
            .redis
            .as_ref()
            .map(|r| r.key_prefix.clone())
            .unwrap_or_default();

        let Some(url) = config.redis_url() else {
            tracing::info!("Redis not configured; caching disabled");
            return Ok(Self { conn: None, prefix });
        };

        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: Some(conn),
            prefix,
        })
    }

    pub fn disabled() -> Self {
        Self {
            conn: None,
            prefix: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    fn key(&self, k: &str) -> String {
        format!("{}{}", self.prefix, k)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .ok()
            .flatten()
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .await
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let k = self.key(key);
        let result: Result<(), _> = if ttl_secs > 0 {
            conn.set_ex(&k, value, ttl_secs).await
        } else {
            conn.set(&k, value).await
        };
        if let Err(e) = result {
            tracing::warn!("cache write failed for {k}: {e}");
        }
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Ok(json) = serde_json::to_string(value) {
            self.set(key, &json, ttl_secs).await;
        }
    }

    pub async fn del(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let k = self.key(key);
        let result: Result<(), _> = conn.del(&k).await;
        if let Err(e) = result {
            tracing::warn!("cache delete failed for {k}: {e}");
        }
    }

    pub async fn health_check(&self) -> Option<bool> {
        let mut conn = self.conn.clone()?;
        Some(
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .is_ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = Cache::disabled();
        cache.set("k", "v", 10).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.health_check().await, None);
        assert!(!cache.is_enabled());
    }
}
