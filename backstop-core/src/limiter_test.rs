use assert_matches::assert_matches;
use proptest::prelude::*;

use crate::{Admission, LimiterConfig, ManualClock, SlidingWindowLimiter};

const LOCALHOST: &str = "127.0.0.1";
const RESOLVER_A: &str = "8.8.8.8";
const RESOLVER_B: &str = "1.1.1.1";

fn limiter() -> SlidingWindowLimiter {
    SlidingWindowLimiter::new(3000, 3)
}

#[test]
fn admits_single_request() {
    let mut limiter = limiter();
    assert_eq!(limiter.admit(LOCALHOST, 1_000), Admission::Admitted);
    assert_eq!(limiter.records(LOCALHOST), Some(vec![1_000]));
}

#[test]
fn rejects_fourth_request_in_same_instant() {
    let mut limiter = limiter();
    let now = 50_000;
    for _ in 0..3 {
        assert!(limiter.admit(LOCALHOST, now).is_admitted());
    }
    assert_eq!(
        limiter.admit(LOCALHOST, now),
        Admission::Rejected {
            retry_after_ms: 3000
        }
    );
}

#[test]
fn admits_spaced_out_requests() {
    let mut limiter = limiter();
    for offset in [0, 800, 2300, 3100, 3801, 5350] {
        assert_eq!(limiter.admit(LOCALHOST, offset), Admission::Admitted, "t={offset}");
    }
}

#[test]
fn rejects_until_oldest_record_expires() {
    let mut limiter = limiter();

    assert!(limiter.admit(LOCALHOST, 0).is_admitted());
    assert!(limiter.admit(LOCALHOST, 800).is_admitted());
    assert!(limiter.admit(LOCALHOST, 2300).is_admitted());
    assert_eq!(limiter.admit(LOCALHOST, 2900).retry_after_ms(), 100);
    assert!(limiter.admit(LOCALHOST, 3100).is_admitted());
    assert_eq!(limiter.admit(LOCALHOST, 3300).retry_after_ms(), 500);

    assert!(limiter.admit(LOCALHOST, 6600).is_admitted());
    assert!(limiter.admit(LOCALHOST, 6601).is_admitted());
    assert!(limiter.admit(LOCALHOST, 6602).is_admitted());
    assert_eq!(limiter.records(LOCALHOST), Some(vec![6600, 6601, 6602]));
}

#[test]
fn rejected_request_is_not_recorded() {
    let mut limiter = limiter();
    for offset in [0, 800, 2300] {
        limiter.admit(LOCALHOST, offset);
    }
    assert_matches!(limiter.admit(LOCALHOST, 2900), Admission::Rejected { .. });
    assert_eq!(limiter.records(LOCALHOST), Some(vec![0, 800, 2300]));
}

#[test]
fn record_exactly_one_window_old_is_expired() {
    let mut limiter = limiter();
    for offset in [0, 800, 2300] {
        limiter.admit(LOCALHOST, offset);
    }
    assert_eq!(limiter.admit(LOCALHOST, 2999).retry_after_ms(), 1);
    assert_eq!(limiter.admit(LOCALHOST, 3000), Admission::Admitted);
    assert_eq!(limiter.records(LOCALHOST), Some(vec![800, 2300, 3000]));
}

#[test]
fn keys_are_independent() {
    let mut limiter = limiter();
    let now = 10_000;

    for (key, last) in [(LOCALHOST, 3), (RESOLVER_A, 5), (RESOLVER_B, 4)] {
        assert!(limiter.admit(key, now).is_admitted());
        assert!(limiter.admit(key, now + 1).is_admitted());
        assert!(limiter.admit(key, now + 2).is_admitted());
        assert_eq!(limiter.admit(key, now + last).retry_after_ms(), 3000 - last);
    }
    assert_eq!(limiter.tracked_keys(), 3);
}

#[test]
fn full_key_does_not_block_other_key() {
    let mut limiter = limiter();
    for _ in 0..4 {
        limiter.admit(LOCALHOST, 0);
    }
    for _ in 0..3 {
        assert!(limiter.admit(RESOLVER_A, 0).is_admitted());
    }
}

#[test]
fn admit_now_reads_clock() {
    let mut limiter = limiter();
    let clock = ManualClock::new(0);
    for _ in 0..3 {
        assert!(limiter.admit_now(LOCALHOST, &clock).is_admitted());
        clock.advance(100);
    }
    assert_eq!(limiter.admit_now(LOCALHOST, &clock).retry_after_ms(), 2700);
    clock.set(3000);
    assert!(limiter.admit_now(LOCALHOST, &clock).is_admitted());
}

#[test]
fn zero_capacity_rejects_everything() {
    let mut limiter = SlidingWindowLimiter::new(1000, 0);
    assert_eq!(
        limiter.admit(LOCALHOST, 0),
        Admission::Rejected {
            retry_after_ms: 1000
        }
    );
}

#[test]
fn decreasing_timestamp_does_not_panic() {
    let mut limiter = limiter();
    for offset in [5000, 5000, 5000] {
        limiter.admit(LOCALHOST, offset);
    }
    assert_eq!(limiter.admit(LOCALHOST, 4000).retry_after_ms(), 3000);
}

#[test]
fn purge_idle_drops_only_expired_keys() {
    let mut limiter = limiter();
    limiter.admit(LOCALHOST, 0);
    limiter.admit(RESOLVER_A, 2000);

    assert_eq!(limiter.purge_idle(2999), 0);
    assert_eq!(limiter.purge_idle(3000), 1);
    assert_eq!(limiter.records(LOCALHOST), None);
    assert_eq!(limiter.records(RESOLVER_A), Some(vec![2000]));
    assert_eq!(limiter.tracked_keys(), 1);
}

#[test]
fn defaults_follow_config() {
    let limiter = SlidingWindowLimiter::default();
    let config = LimiterConfig::default();
    assert_eq!(limiter.window_size_ms(), config.window_size_ms);
    assert_eq!(limiter.capacity(), config.capacity);
}

proptest! {
    #[test]
    fn window_never_exceeds_capacity(
        capacity in 1usize..6,
        window in 1u64..5_000,
        gaps in proptest::collection::vec(0u64..2_000, 1..64),
    ) {
        let mut limiter = SlidingWindowLimiter::new(window, capacity);
        let mut now = 0u64;
        for gap in gaps {
            now += gap;
            let decision = limiter.admit(LOCALHOST, now);
            let records = limiter.records(LOCALHOST).unwrap_or_default();
            prop_assert!(records.len() <= capacity);
            prop_assert!(records.iter().all(|t| now - t < window));
            match decision {
                Admission::Admitted => prop_assert_eq!(records.last().copied(), Some(now)),
                Admission::Rejected { retry_after_ms } => {
                    prop_assert_eq!(records.len(), capacity);
                    prop_assert!(retry_after_ms > 0 && retry_after_ms <= window);
                    prop_assert_eq!(retry_after_ms, window - (now - records[0]));
                }
            }
        }
    }
}
