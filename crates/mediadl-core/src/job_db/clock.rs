//! Monotonic microsecond clock for row timestamps.
//!
//! Wall-clock time can repeat (or step backwards) within a process under
//! sub-millisecond churn; every value handed out here is strictly greater
//! than the previous one. The UPDATE statements additionally write
//! `MAX(?, updated_at + 1)` so the rule holds across processes too.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Strictly increasing source of microsecond timestamps.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Current time in microseconds since the epoch, never repeating.
    pub fn now_micros(&self) -> i64 {
        let wall = wall_micros();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

static CLOCK: MonotonicClock = MonotonicClock::new();

/// Process-wide monotonic timestamp (microseconds). Used for every row write.
pub fn now_micros() -> i64 {
    CLOCK.now_micros()
}

fn wall_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}
