// crates/backend-lib/src/middleware/rate_limit.rs

//! Per-client token bucket.
//!
//! Buckets live in the shared state store under `rate_limit:{ip}` as a hash
//! `{tokens, last_refill_ts}` and are refilled lazily from the elapsed time
//! on every request. The read-modify-write is not atomic: two concurrent
//! requests from one client may both spend the same token.
use super::client_ip::client_ip;
use crate::clock::Clock;
use crate::config::RateLimitSettings;
use crate::error::AppError;
use crate::metrics::{CLIENT_UNKNOWN, RATE_LIMIT_ADMITTED, RATE_LIMIT_REJECTED};
use crate::store::{rate_limit_key, KeyValueStore, StoreError};
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TOKENS_FIELD: &str = "tokens";
const LAST_REFILL_FIELD: &str = "last_refill_ts";

/// Decision for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Whole tokens left after this request
    Admitted { remaining: u32 },
    /// Bucket is empty; one token is earned back after `retry_after_secs`
    Rejected { retry_after_secs: u64 },
}

/// Bucket state as stored
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    tokens: f64,
    last_refill_ts: i64,
}

impl Bucket {
    fn parse(fields: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            tokens: fields.get(TOKENS_FIELD)?.parse().ok()?,
            last_refill_ts: fields.get(LAST_REFILL_FIELD)?.parse().ok()?,
        })
    }
}

/// Token-bucket rate limiter keyed by client address
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    capacity: f64,
    refill_period_secs: f64,
    ttl: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: &RateLimitSettings,
    ) -> Self {
        // an idle bucket is full again after this long, so expiring it is harmless
        let ttl = Duration::from_secs(
            u64::from(settings.capacity).saturating_mul(settings.refill_period_secs),
        );
        Self {
            store,
            clock,
            capacity: f64::from(settings.capacity),
            refill_period_secs: settings.refill_period_secs as f64,
            ttl,
        }
    }

    /// Spend one token of `client`'s bucket if it has one
    pub async fn admit(&self, client: &str) -> Result<Admission, StoreError> {
        let key = rate_limit_key(client);
        let now = self.clock.now();

        let fields = self.store.hash_get_all(&key).await?;
        let bucket = if fields.is_empty() {
            None
        } else {
            let parsed = Bucket::parse(&fields);
            if parsed.is_none() {
                warn!(%key, "unreadable bucket, starting a fresh one");
            }
            parsed
        };
        let Bucket {
            tokens,
            last_refill_ts,
        } = bucket.unwrap_or(Bucket {
            tokens: self.capacity,
            last_refill_ts: now,
        });

        let elapsed = now.saturating_sub(last_refill_ts).max(0) as f64;
        let mut tokens = (tokens + elapsed / self.refill_period_secs).min(self.capacity);

        let admission = if tokens < 1.0 {
            // shave float noise so 2.0000000000000004 does not round up to 3
            let wait = (1.0 - tokens) * self.refill_period_secs - 1e-9;
            let retry_after_secs = wait.ceil().max(1.0);
            Admission::Rejected {
                retry_after_secs: retry_after_secs as u64,
            }
        } else {
            tokens -= 1.0;
            Admission::Admitted {
                remaining: tokens.floor() as u32,
            }
        };

        self.store
            .hash_set(
                &key,
                &[
                    (TOKENS_FIELD, tokens.to_string()),
                    (LAST_REFILL_FIELD, now.to_string()),
                ],
                Some(self.ttl),
            )
            .await?;

        Ok(admission)
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let Some(ip) = client_ip(request.headers(), peer) else {
        counter!(CLIENT_UNKNOWN).increment(1);
        warn!(path = %request.uri().path(), "request without a usable client address");
        return Err(AppError::UnknownClient);
    };

    match state.rate_limiter.admit(&ip.to_string()).await? {
        Admission::Admitted { remaining } => {
            counter!(RATE_LIMIT_ADMITTED).increment(1);
            debug!(%ip, remaining, "request admitted");
            Ok(next.run(request).await)
        },
        Admission::Rejected { retry_after_secs } => {
            counter!(RATE_LIMIT_REJECTED).increment(1);
            Err(AppError::RateLimitExceeded { retry_after_secs })
        },
    }
}
