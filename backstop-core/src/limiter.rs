use std::collections::{HashMap, VecDeque};

use crate::clock::Clock;
use crate::config::LimiterConfig;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { retry_after_ms: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Zero when admitted, otherwise the time until the oldest record expires.
    pub fn retry_after_ms(&self) -> u64 {
        match self {
            Admission::Admitted => 0,
            Admission::Rejected { retry_after_ms } => *retry_after_ms,
        }
    }
}

/// Per-key sliding-window admission control.
///
/// Each key keeps the timestamps of its admitted requests, oldest first. A record
/// stays in the window while `now - t < window_size_ms`, so a record exactly one
/// window old is already expired. Pruning happens only when the key itself is
/// accessed.
///
/// Timestamps for one key must be non-decreasing. Going backwards is not detected;
/// the arithmetic saturates rather than panicking, and decisions made from such
/// input are unspecified.
///
/// Keys are never dropped on their own. Call [`SlidingWindowLimiter::purge_idle`]
/// to reclaim keys whose records have all expired.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window_size_ms: u64,
    capacity: usize,
    records: HashMap<String, VecDeque<u64>>,
}

impl SlidingWindowLimiter {
    pub fn new(window_size_ms: u64, capacity: usize) -> Self {
        Self {
            window_size_ms,
            capacity,
            records: HashMap::new(),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.window_size_ms, config.capacity)
    }

    pub fn window_size_ms(&self) -> u64 {
        self.window_size_ms
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records a request for `key` at `timestamp_ms` if the window has room.
    pub fn admit(&mut self, key: &str, timestamp_ms: u64) -> Admission {
        let window = self.window_size_ms;
        let records = self.records.entry(key.to_string()).or_default();

        while let Some(&oldest) = records.front() {
            if timestamp_ms.saturating_sub(oldest) < window {
                break;
            }
            records.pop_front();
        }

        if records.len() < self.capacity {
            records.push_back(timestamp_ms);
            return Admission::Admitted;
        }

        let retry_after_ms = match records.front() {
            Some(&oldest) => window - timestamp_ms.saturating_sub(oldest),
            None => window,
        };
        Admission::Rejected { retry_after_ms }
    }

    /// [`admit`](Self::admit) stamped with the clock's current reading.
    pub fn admit_now<C: Clock + ?Sized>(&mut self, key: &str, clock: &C) -> Admission {
        self.admit(key, clock.now_ms())
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Retained timestamps for `key` as of its last access, oldest first.
    pub fn records(&self, key: &str) -> Option<Vec<u64>> {
        self.records
            .get(key)
            .map(|records| records.iter().copied().collect())
    }

    /// Drops every key whose records have all expired at `now_ms`.
    ///
    /// Returns the number of keys removed.
    pub fn purge_idle(&mut self, now_ms: u64) -> usize {
        let window = self.window_size_ms;
        let before = self.records.len();
        self.records.retain(|_, records| {
            records
                .back()
                .is_some_and(|&newest| now_ms.saturating_sub(newest) < window)
        });
        before - self.records.len()
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::from_config(&LimiterConfig::default())
    }
}
