// ============================
// crates/backend-lib/src/auth/backoff.rs
// ============================
//! Per-identity exponential backoff for failed logins.
//!
//! Each failure pushes the next allowed attempt further out:
//! `base * 2^(failCount - 1)` seconds after the failure. A success deletes
//! the record; an idle record expires with the store TTL.

use crate::clock::Clock;
use crate::config::BackoffSettings;
use crate::metrics::BACKOFF_BLOCKED;
use crate::store::{backoff_key, KeyValueStore, StoreError};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Stored under `backoff:{email}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffRecord {
    pub fail_count: u32,
    /// Epoch seconds before which attempts are rejected
    pub next_allowed: i64,
}

/// Outcome of [`BackoffGate::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStatus {
    Allowed,
    Blocked { remaining_secs: u64 },
}

/// Failed-login gate keyed by identity
#[derive(Clone)]
pub struct BackoffGate {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    base_delay_secs: u64,
    max_delay_secs: Option<u64>,
    ttl: Duration,
}

impl BackoffGate {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: &BackoffSettings,
    ) -> Self {
        Self {
            store,
            clock,
            base_delay_secs: settings.base_delay_secs,
            max_delay_secs: settings.max_delay_secs,
            ttl: Duration::from_secs(settings.ttl_secs),
        }
    }

    async fn load(&self, key: &str) -> Result<Option<BackoffRecord>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Window length after the `fail_count`-th consecutive failure
    pub fn delay_for(&self, fail_count: u32) -> u64 {
        let exponent = fail_count.saturating_sub(1);
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        let delay = self.base_delay_secs.saturating_mul(factor);
        match self.max_delay_secs {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Whether `identity` may attempt a login right now
    pub async fn check(&self, identity: &str) -> Result<BackoffStatus, StoreError> {
        let Some(record) = self.load(&backoff_key(identity)).await? else {
            return Ok(BackoffStatus::Allowed);
        };

        let now = self.clock.now();
        if now >= record.next_allowed {
            return Ok(BackoffStatus::Allowed);
        }

        let remaining_secs = record.next_allowed.saturating_sub(now).unsigned_abs();
        counter!(BACKOFF_BLOCKED).increment(1);
        warn!(
            fail_count = record.fail_count,
            remaining_secs, "login attempt inside backoff window"
        );
        Ok(BackoffStatus::Blocked { remaining_secs })
    }

    /// Count one more failure and extend the window
    pub async fn record_failure(&self, identity: &str) -> Result<BackoffRecord, StoreError> {
        let key = backoff_key(identity);
        let fail_count = match self.load(&key).await? {
            Some(previous) => previous.fail_count.saturating_add(1),
            None => 1,
        };

        let delay = i64::try_from(self.delay_for(fail_count)).unwrap_or(i64::MAX);
        let record = BackoffRecord {
            fail_count,
            next_allowed: self.clock.now().saturating_add(delay),
        };

        let json = serde_json::to_string(&record).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&key, &json, Some(self.ttl)).await?;

        debug!(fail_count, delay_secs = delay, "recorded failed login");
        Ok(record)
    }

    /// Forget previous failures
    pub async fn reset(&self, identity: &str) -> Result<(), StoreError> {
        self.store.delete(&backoff_key(identity)).await
    }
}
