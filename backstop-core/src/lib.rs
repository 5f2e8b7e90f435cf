//! Retry-with-backoff and sliding-window admission primitives shared by the
//! backstop gate and client.

mod backoff;
mod clock;
mod config;
mod limiter;
#[cfg(test)]
mod limiter_test;
mod retry;
#[cfg(test)]
mod retry_test;

pub use backoff::BackoffSchedule;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BackoffConfig, ConfigError, LimiterConfig, load_toml, save_toml};
pub use limiter::{Admission, SlidingWindowLimiter};
pub use retry::{DelayFn, RetryController, capped, execute_with_retry};
