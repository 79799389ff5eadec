// ==============================
// tests/unit/rate_limit_tests.rs
// ==============================
//! This test suite validates the token-bucket `RateLimiter`
use backend_lib::clock::ManualClock;
use backend_lib::config::RateLimitSettings;
use backend_lib::middleware::{Admission, RateLimiter};
use backend_lib::store::MemoryStore;
use std::sync::Arc;

use crate::test_utils::T0;

fn limiter(settings: RateLimitSettings) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    (RateLimiter::new(store, clock.clone(), &settings), clock)
}

async fn drain(limiter: &RateLimiter, client: &str) -> usize {
    let mut admitted = 0;
    while let Admission::Admitted { .. } = limiter.admit(client).await.unwrap() {
        admitted += 1;
    }
    admitted
}

#[tokio::test]
async fn test_ten_rapid_requests_then_reject() {
    let (limiter, _) = limiter(RateLimitSettings::default());
    assert_eq!(drain(&limiter, "127.0.0.1").await, 10);
}

#[tokio::test]
async fn test_steady_refill_admits_one_per_period() {
    let (limiter, clock) = limiter(RateLimitSettings::default());
    drain(&limiter, "127.0.0.1").await;

    for _ in 0..5 {
        clock.advance(6);
        assert_eq!(drain(&limiter, "127.0.0.1").await, 1);
    }
}

#[tokio::test]
async fn test_idle_client_is_capped_at_capacity() {
    let (limiter, clock) = limiter(RateLimitSettings::default());
    drain(&limiter, "127.0.0.1").await;

    clock.advance(24 * 60 * 60);
    assert_eq!(drain(&limiter, "127.0.0.1").await, 10);
}

#[tokio::test]
async fn test_retry_after_reflects_partial_refill() {
    let (limiter, clock) = limiter(RateLimitSettings {
        capacity: 2,
        refill_period_secs: 4,
    });
    drain(&limiter, "127.0.0.1").await;

    clock.advance(1);
    assert_eq!(
        limiter.admit("127.0.0.1").await.unwrap(),
        Admission::Rejected {
            retry_after_secs: 3
        }
    );
}

#[tokio::test]
async fn test_custom_capacity_and_period() {
    let (limiter, clock) = limiter(RateLimitSettings {
        capacity: 3,
        refill_period_secs: 2,
    });
    assert_eq!(drain(&limiter, "127.0.0.1").await, 3);

    clock.advance(4);
    assert_eq!(drain(&limiter, "127.0.0.1").await, 2);
}

#[tokio::test]
async fn test_different_clients_tracked_separately() {
    let (limiter, _) = limiter(RateLimitSettings::default());
    drain(&limiter, "127.0.0.1").await;

    assert!(matches!(
        limiter.admit("127.0.0.2").await.unwrap(),
        Admission::Admitted { remaining: 9 }
    ));
    assert!(matches!(
        limiter.admit("::1").await.unwrap(),
        Admission::Admitted { remaining: 9 }
    ));
}
