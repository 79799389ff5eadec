// ==============================
// tests/unit/backoff_tests.rs
// ==============================
//! This test suite validates the failed-login `BackoffGate`
use backend_lib::auth::{BackoffGate, BackoffStatus};
use backend_lib::clock::{Clock, ManualClock};
use backend_lib::config::BackoffSettings;
use backend_lib::store::{KeyValueStore, MemoryStore};
use std::sync::Arc;

use crate::test_utils::T0;

struct Fixture {
    gate: BackoffGate,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
}

fn fixture(settings: BackoffSettings) -> Fixture {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    Fixture {
        gate: BackoffGate::new(store.clone(), clock.clone(), &settings),
        clock,
        store,
    }
}

#[tokio::test]
async fn test_windows_are_one_two_four_seconds() {
    let f = fixture(BackoffSettings::default());

    for window in [1u64, 2, 4] {
        f.gate.record_failure("a@x.com").await.unwrap();
        assert_eq!(
            f.gate.check("a@x.com").await.unwrap(),
            BackoffStatus::Blocked {
                remaining_secs: window
            }
        );
        f.clock.advance(window as i64 - 1);
        assert!(matches!(
            f.gate.check("a@x.com").await.unwrap(),
            BackoffStatus::Blocked { remaining_secs: 1 }
        ));
        f.clock.advance(1);
        assert_eq!(f.gate.check("a@x.com").await.unwrap(), BackoffStatus::Allowed);
    }
}

#[tokio::test]
async fn test_identities_are_independent() {
    let f = fixture(BackoffSettings::default());
    f.gate.record_failure("a@x.com").await.unwrap();
    assert_eq!(f.gate.check("b@x.com").await.unwrap(), BackoffStatus::Allowed);
}

#[tokio::test]
async fn test_reset_deletes_record() {
    let f = fixture(BackoffSettings::default());
    f.gate.record_failure("a@x.com").await.unwrap();
    f.gate.reset("a@x.com").await.unwrap();

    assert_eq!(f.store.get("backoff:a@x.com").await.unwrap(), None);
    assert_eq!(f.gate.check("a@x.com").await.unwrap(), BackoffStatus::Allowed);
}

#[tokio::test]
async fn test_record_expires_after_fifteen_minutes() {
    let f = fixture(BackoffSettings::default());
    for _ in 0..5 {
        f.gate.record_failure("a@x.com").await.unwrap();
    }

    f.clock.advance(15 * 60);
    assert_eq!(f.store.get("backoff:a@x.com").await.unwrap(), None);
    assert_eq!(f.gate.record_failure("a@x.com").await.unwrap().fail_count, 1);
}

#[tokio::test]
async fn test_configured_cap() {
    let f = fixture(BackoffSettings {
        base_delay_secs: 2,
        max_delay_secs: Some(10),
        ..BackoffSettings::default()
    });

    let mut windows = Vec::new();
    for _ in 0..5 {
        let record = f.gate.record_failure("a@x.com").await.unwrap();
        windows.push(record.next_allowed - f.clock.now());
    }
    assert_eq!(windows, vec![2, 4, 8, 10, 10]);
}
