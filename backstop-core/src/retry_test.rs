use std::cell::{Cell, RefCell};
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::time::Instant;

use crate::{BackoffSchedule, RetryController, capped, execute_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    Throttled,
    Fatal(String),
}

fn is_throttled(failure: &Failure) -> bool {
    *failure == Failure::Throttled
}

fn assert_elapsed(started: Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn returns_value_without_retry() {
    let started = Instant::now();
    let delays = Cell::new(0);

    let result = execute_with_retry(
        || async { Ok::<_, Failure>(0xABC) },
        |_| false,
        |_| {
            delays.set(delays.get() + 1);
            Duration::from_millis(1)
        },
    )
    .await;

    assert_eq!(result, Ok(0xABC));
    assert_eq!(delays.get(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn retries_twice_then_succeeds() {
    let attempts = Cell::new(0);
    let delays = RefCell::new(Vec::new());

    let result = execute_with_retry(
        || {
            let attempt = attempts.get();
            attempts.set(attempt + 1);
            async move {
                if attempt < 2 {
                    Err(Failure::Throttled)
                } else {
                    Ok("done")
                }
            }
        },
        is_throttled,
        |index| {
            delays.borrow_mut().push(index);
            Duration::from_millis(10)
        },
    )
    .await;

    assert_eq!(result, Ok("done"));
    assert_eq!(attempts.get(), 3);
    assert_eq!(*delays.borrow(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_propagates_unchanged() {
    let delays = Cell::new(0);

    let result: Result<(), Failure> = execute_with_retry(
        || async { Err(Failure::Fatal("Catastrophic error...".to_string())) },
        is_throttled,
        |_| {
            delays.set(delays.get() + 1);
            Duration::from_millis(1)
        },
    )
    .await;

    assert_eq!(result, Err(Failure::Fatal("Catastrophic error...".to_string())));
    assert_eq!(delays.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn retries_ten_times_then_fails_terminally() {
    let attempts = Cell::new(0u32);
    let delays = Cell::new(0u32);

    let result: Result<(), Failure> = execute_with_retry(
        || {
            let attempt = attempts.get();
            attempts.set(attempt + 1);
            let retries_so_far = delays.get();
            async move {
                if attempt < 10 {
                    Err(Failure::Throttled)
                } else {
                    Err(Failure::Fatal(format!("total retries: {retries_so_far}")))
                }
            }
        },
        is_throttled,
        |_| {
            delays.set(delays.get() + 1);
            Duration::from_millis(1)
        },
    )
    .await;

    assert_matches!(result, Err(Failure::Fatal(message)) if message == "total retries: 10");
}

#[tokio::test(start_paused = true)]
async fn keeps_retrying_without_cap() {
    let attempts = Cell::new(0u32);

    let result = execute_with_retry(
        || {
            let attempt = attempts.get();
            attempts.set(attempt + 1);
            async move {
                if attempt < 1_000 {
                    Err(Failure::Throttled)
                } else {
                    Ok(attempt)
                }
            }
        },
        |_| true,
        |_| Duration::from_millis(1),
    )
    .await;

    assert_eq!(result, Ok(1_000));
}

#[tokio::test(start_paused = true)]
async fn sleeps_for_scheduled_delays() {
    let started = Instant::now();
    let attempts = Cell::new(0);
    let schedule = BackoffSchedule::new(Duration::from_millis(2000), 1.5);

    let result = execute_with_retry(
        || {
            let attempt = attempts.get();
            attempts.set(attempt + 1);
            async move {
                if attempt < 3 {
                    Err(Failure::Throttled)
                } else {
                    Ok(())
                }
            }
        },
        is_throttled,
        schedule.delay_fn(),
    )
    .await;

    assert_eq!(result, Ok(()));
    assert_elapsed(started, Duration::from_millis(2000 + 3000 + 4500));
}

#[tokio::test(start_paused = true)]
async fn capped_predicate_bounds_retries() {
    let attempts = Cell::new(0);

    let result: Result<(), Failure> = execute_with_retry(
        || {
            attempts.set(attempts.get() + 1);
            async { Err(Failure::Throttled) }
        },
        capped(3, is_throttled),
        |_| Duration::from_millis(5),
    )
    .await;

    assert_eq!(result, Err(Failure::Throttled));
    assert_eq!(attempts.get(), 4);
}

#[tokio::test(start_paused = true)]
async fn controller_runs_are_independent() {
    let schedule = BackoffSchedule::new(Duration::from_millis(100), 2.0);
    let mut controller = RetryController::new(is_throttled, schedule.delay_fn());

    for _ in 0..2 {
        let started = Instant::now();
        let attempts = Cell::new(0);
        let result = controller
            .run(|| {
                let attempt = attempts.get();
                attempts.set(attempt + 1);
                async move {
                    if attempt < 2 {
                        Err(Failure::Throttled)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_elapsed(started, Duration::from_millis(100 + 200));
    }
}

#[tokio::test(start_paused = true)]
async fn controller_with_schedule_uses_backoff() {
    let schedule = BackoffSchedule::new(Duration::from_millis(2000), 1.5);
    let mut controller = RetryController::with_schedule(schedule, is_throttled);
    let started = Instant::now();
    let attempts = Cell::new(0);

    let result: Result<(), Failure> = controller
        .run(|| {
            let attempt = attempts.get();
            attempts.set(attempt + 1);
            async move {
                match attempt {
                    0 | 1 => Err(Failure::Throttled),
                    _ => Err(Failure::Fatal("gone".to_string())),
                }
            }
        })
        .await;

    assert_matches!(result, Err(Failure::Fatal(reason)) if reason == "gone");
    assert_elapsed(started, Duration::from_millis(2000 + 3000));
}
