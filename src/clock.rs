//! Time source used for deadlines and timed waits.

use std::fmt;
use std::time::Instant;

/// Supplies the monotonic "now" that deadlines are compared against.
///
/// Worker threads still sleep on real time, so an implementation must not
/// run behind `Instant::now()` or timed tasks fire late.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
