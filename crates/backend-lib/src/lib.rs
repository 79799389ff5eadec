// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the `authgate` server.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod store;
pub mod validation;

use crate::auth::{
    Argon2Hasher, BackoffGate, CredentialHasher, HashingError, SessionManager, TokenCodec,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, StoreBackend};
use crate::middleware::rate_limit::RateLimiter;
use crate::storage::{FlatFileStorage, IdentityStore};
use crate::store::{KeyValueStore, MemoryStore, RedisStore};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle manager
    pub sessions: SessionManager,
    /// Per-client token bucket
    pub rate_limiter: RateLimiter,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
    /// Set when the in-process store backend is used, for periodic purging
    pub memory_store: Option<Arc<MemoryStore>>,
}

impl AppState {
    /// Build every collaborator from settings: key material, stores, hasher
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (store, memory_store) = match settings.store.backend {
            StoreBackend::Memory => {
                let memory = Arc::new(MemoryStore::new(clock.clone()));
                let store: Arc<dyn KeyValueStore> = memory.clone();
                (store, Some(memory))
            },
            StoreBackend::Redis => {
                let redis = RedisStore::connect(&settings.store.redis_url, settings.store.timeout())
                    .await
                    .context("cannot connect to the redis state store")?;
                let store: Arc<dyn KeyValueStore> = Arc::new(redis);
                (store, None)
            },
        };

        let identities = Arc::new(
            FlatFileStorage::new(&settings.data_dir).with_context(|| {
                format!("cannot open identity store at {}", settings.data_dir.display())
            })?,
        );
        let hasher = Arc::new(
            Argon2Hasher::from_settings(&settings.password).context("invalid argon2 settings")?,
        );
        let codec = TokenCodec::load(&settings.tokens, clock.clone())?;

        info!(
            backend = ?settings.store.backend,
            data_dir = %settings.data_dir.display(),
            "application state ready"
        );

        let mut state = Self::from_parts(settings, clock, store, identities, hasher, codec)
            .context("cannot prepare the credential hasher")?;
        state.memory_store = memory_store;
        Ok(state)
    }

    /// Wire already constructed collaborators together
    pub fn from_parts(
        settings: Settings,
        clock: Arc<dyn Clock>,
        store: Arc<dyn KeyValueStore>,
        identities: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        codec: TokenCodec,
    ) -> Result<Self, HashingError> {
        let backoff = BackoffGate::new(store.clone(), clock.clone(), &settings.backoff);
        let rate_limiter = RateLimiter::new(store, clock.clone(), &settings.rate_limit);
        let sessions = SessionManager::new(
            identities,
            hasher,
            Arc::new(codec),
            backoff,
            clock,
            settings.password.min_length,
        )?;

        Ok(Self {
            sessions,
            rate_limiter,
            settings: Arc::new(settings),
            memory_store: None,
        })
    }
}
