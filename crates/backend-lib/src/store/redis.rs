// ============================
// crates/backend-lib/src/store/redis.rs
// ============================
//! Redis-backed state store for multi-instance deployments.

use super::{bounded, KeyValueStore, StoreError};
use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// State store talking to a single logical Redis instance
///
/// The connection manager reconnects transparently; each command is bounded
/// by `timeout` so a stalled server surfaces as [`StoreError::Timeout`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        let conn = bounded(timeout, async {
            ConnectionManager::new(client).await.map_err(StoreError::from)
        })
        .await?;

        info!(url = %redact(url), "connected to redis state store");
        Ok(Self { conn, timeout })
    }
}

/// Strip credentials from a connection URL before logging it
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, async move {
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, async move {
            match ttl {
                Some(ttl) => {
                    let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
                }
                None => {
                    let _: () = conn.set(key, value).await?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, async move {
            let _: i64 = conn.del(key).await?;
            Ok(())
        })
        .await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, async move {
            let fields: HashMap<String, String> = conn.hgetall(key).await?;
            Ok(fields)
        })
        .await
    }

    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = ::redis::pipe();
        pipe.atomic().hset_multiple(key, fields).ignore();
        if let Some(ttl) = ttl {
            pipe.expire(key, ttl.as_secs().max(1) as i64).ignore();
        }

        bounded(self.timeout, async move {
            let _: () = pipe.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}
