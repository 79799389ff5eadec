// ============================
// crates/backend-lib/src/store/memory.rs
// ============================
//! In-process state store for single-node deployments and tests.

use super::{KeyValueStore, StoreError};
use crate::clock::Clock;
use crate::metrics::STORE_PURGED;
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Epoch second at which the entry stops being visible
    expires_at: Option<i64>,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// `DashMap`-backed store with lazy expiry
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<i64> {
        ttl.map(|ttl| self.clock.now().saturating_add(ttl.as_secs() as i64))
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?.clone();
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
            None
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge on a fixed interval; runs until the task is dropped
    pub async fn purge_periodically(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = self.purge_expired();
            if removed > 0 {
                counter!(STORE_PURGED).increment(removed as u64);
                debug!(removed, "purged expired keys");
            }
        }
    }

    /// Number of keys currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text)),
            Some(_) => Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "expected a string value, found a hash".to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let entry = Entry {
            value: Value::Text(value.to_string()),
            expires_at: self.expiry(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.live(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields),
            Some(_) => Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "expected a hash, found a string value".to_string(),
            }),
        }
    }

    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });

        if !entry.is_live(now) || !matches!(entry.value, Value::Hash(_)) {
            *entry = Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            };
        }
        if let Value::Hash(map) = &mut entry.value {
            for (field, value) in fields {
                map.insert((*field).to_string(), value.clone());
            }
        }
        if expires_at.is_some() {
            entry.expires_at = expires_at;
        }
        Ok(())
    }
}
