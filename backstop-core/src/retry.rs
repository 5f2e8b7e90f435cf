use std::future::Future;
use std::time::Duration;

use crate::backoff::BackoffSchedule;

/// Boxed delay function produced by [`RetryController::with_schedule`].
pub type DelayFn = Box<dyn FnMut(u32) -> Duration + Send + Sync>;

/// Runs `operation` until it succeeds or fails with an error `should_retry` rejects.
///
/// The first attempt starts immediately. After the n-th retryable failure
/// (counting from zero) the loop sleeps for `delay_for(n)` before trying again.
/// A non-retryable error is returned to the caller untouched.
///
/// There is no retry limit. A predicate that always answers `true` paired with an
/// operation that never succeeds loops forever. Bound the loop by closing over a
/// counter in the predicate (see [`capped`]) or by wrapping the returned future in
/// `tokio::time::timeout`.
pub async fn execute_with_retry<T, E, Op, Fut, P, D>(
    mut operation: Op,
    mut should_retry: P,
    mut delay_for: D,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    D: FnMut(u32) -> Duration,
{
    let mut retry_index: Option<u32> = None;
    loop {
        if let Some(index) = retry_index {
            let delay = delay_for(index);
            tracing::debug!(
                retry = index,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error) {
                    return Err(error);
                }
                retry_index = Some(retry_index.map_or(0, |index| index.saturating_add(1)));
            }
        }
    }
}

/// A retry predicate and delay function bundled for reuse across calls.
///
/// Every [`run`](Self::run) is an independent retry loop; nothing carries over
/// between runs except whatever state the predicate itself closes over.
#[derive(Debug, Clone)]
pub struct RetryController<P, D> {
    should_retry: P,
    delay_for: D,
}

impl<P, D> RetryController<P, D> {
    pub fn new(should_retry: P, delay_for: D) -> Self {
        Self {
            should_retry,
            delay_for,
        }
    }

    pub async fn run<T, E, Op, Fut>(&mut self, operation: Op) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        D: FnMut(u32) -> Duration,
    {
        execute_with_retry(operation, &mut self.should_retry, &mut self.delay_for).await
    }
}

impl<P> RetryController<P, DelayFn> {
    pub fn with_schedule(schedule: BackoffSchedule, should_retry: P) -> Self {
        Self::new(should_retry, Box::new(schedule.delay_fn()))
    }
}

/// Wraps `should_retry` so it allows at most `max_retries` retries in total.
pub fn capped<E, P>(max_retries: u32, mut should_retry: P) -> impl FnMut(&E) -> bool
where
    P: FnMut(&E) -> bool,
{
    let mut retries = 0u32;
    move |error: &E| {
        if retries >= max_retries || !should_retry(error) {
            return false;
        }
        retries += 1;
        true
    }
}
