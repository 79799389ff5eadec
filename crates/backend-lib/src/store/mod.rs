// ============================
// crates/backend-lib/src/store/mod.rs
// ============================
//! Shared state store used by the rate limiter and the backoff gate.
//!
//! ## Key patterns
//!
//! ```text
//! rate_limit:{ip}    → hash { tokens, last_refill_ts }
//! backoff:{email}    → JSON { failCount, nextAllowed } (15 min TTL)
//! ```
//!
//! Reads and writes are individually atomic per key; callers perform
//! read-modify-write sequences on top and tolerate the race between them.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a state store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store timed out after {0:?}")]
    Timeout(Duration),

    #[error("state store unavailable: {0}")]
    Backend(String),

    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Key-value store with hash fields and optional expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a string value, replacing any previous value and expiry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove a key of any type; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read every field of a hash; an absent key yields an empty map
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Write hash fields and, when given, reset the key's expiry
    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
}

/// Run a store operation under a deadline
pub(crate) async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Store key of a client's token bucket
pub fn rate_limit_key(client: &str) -> String {
    format!("rate_limit:{client}")
}

/// Store key of an identity's backoff record
pub fn backoff_key(identity: &str) -> String {
    format!("backoff:{identity}")
}
