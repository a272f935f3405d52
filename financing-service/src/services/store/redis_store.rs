use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::{ExposeSecret, Secret};

use super::{KeyValueStore, StoreError, StoreResult};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

/// Redis-backed store. Prefix enumeration walks `SCAN MATCH <prefix>*`.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &Secret<String>) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url.expose_secret().as_str())?;

        // ConnectionManager reconnects on its own after a dropped connection.
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }
}

fn unavailable(op: &'static str, key: &str, e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(anyhow::anyhow!("redis {} {} failed: {}", op, key, e))
}

/// Escape glob metacharacters so a key prefix matches literally.
pub(crate) fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| unavailable("SET", key, e))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("GET", key, e))
    }

    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = match_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut values = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable("SCAN", prefix, e))?;

            if !keys.is_empty() {
                // A key removed between SCAN and MGET comes back as nil.
                let batch: Vec<Option<String>> = redis::cmd("MGET")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| unavailable("MGET", prefix, e))?;
                values.extend(batch.into_iter().flatten());
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(values)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("SET NX", key, e))?;
        Ok(reply.is_some())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("PING", "", e))
    }
}
