use std::time::Duration;

use crate::config::BackoffConfig;

/// Exponential delay schedule: `base_delay * exponent^retry_index`.
///
/// The schedule holds no state, so a single value can be shared by any number of
/// concurrent retry loops. A zero exponent yields `base_delay` for the first retry
/// and zero afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffSchedule {
    base_delay: Duration,
    exponent: f64,
}

impl BackoffSchedule {
    pub fn new(base_delay: Duration, exponent: f64) -> Self {
        Self {
            base_delay,
            exponent,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(Duration::from_millis(config.base_delay_ms), config.exponent)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Raw delay in (fractional) milliseconds for the given retry index.
    pub fn delay_ms(&self, retry_index: u32) -> f64 {
        self.delay_nanos(retry_index) / 1_000_000.0
    }

    /// Delay to wait before the retry with the given index.
    ///
    /// Values too large for a `Duration` saturate to `Duration::MAX`; a negative or
    /// NaN result (only reachable through a negative exponent) becomes zero.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let nanos = self.delay_nanos(retry_index);
        if nanos.is_nan() || nanos <= 0.0 {
            return Duration::ZERO;
        }
        if nanos < u64::MAX as f64 {
            return Duration::from_nanos(nanos as u64);
        }
        Duration::try_from_secs_f64(nanos / 1_000_000_000.0).unwrap_or(Duration::MAX)
    }

    /// The schedule as a delay function for [`crate::execute_with_retry`].
    pub fn delay_fn(self) -> impl Fn(u32) -> Duration + Copy + Send + Sync {
        move |retry_index| self.delay_for(retry_index)
    }

    fn delay_nanos(&self, retry_index: u32) -> f64 {
        let power = i32::try_from(retry_index).unwrap_or(i32::MAX);
        self.base_delay.as_nanos() as f64 * self.exponent.powi(power)
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
