//! The wall-clock oracle: timestamps are microseconds since the Unix epoch
//! and must be monotonically non-decreasing across a single caller's
//! operations. The engine only ever consumes `Clock`; it never reasons
//! about wall-clock time itself.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_micros(&self) -> i64;
}

/// Production clock. Monotonicity is enforced process-wide (stronger than
/// strictly required per-caller) via a compare-and-swap high-water mark,
/// so two operations racing on the same microsecond never appear to go
/// backwards; ties beyond that are broken by auto-assigned row ids.
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { last: AtomicI64::new(0) }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);

        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = if wall > prev { wall } else { prev + 1 };
            match self.last.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Deterministic clock for tests: each call advances by one microsecond
/// from a fixed starting point, so ordering assertions don't depend on
/// wall-clock granularity.
#[cfg(test)]
pub struct FixedClock {
    next: AtomicI64,
}

#[cfg(test)]
impl FixedClock {
    pub fn starting_at(start: i64) -> Self {
        Self { next: AtomicI64::new(start) }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now_micros(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let mut last = clock.now_micros();
        for _ in 0..1000 {
            let next = clock.now_micros();
            assert!(next >= last, "{next} should be >= {last}");
            last = next;
        }
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::starting_at(100);
        assert_eq!(clock.now_micros(), 100);
        assert_eq!(clock.now_micros(), 101);
        assert_eq!(clock.now_micros(), 102);
    }
}
