//! Clocks
//!
//! A [`Clock`] reports monotonic time elapsed since its own epoch. The
//! scheduler reads deadlines against it, which lets tests swap real time for
//! a [`VirtualClock`] that only moves when told to.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's epoch
    fn now(&self) -> Duration;
}

/// Wall-clock time, measured from the moment the clock was created
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Controllable clock for deterministic tests
///
/// Clones share the same underlying time, so a test can keep one clone and
/// hand another to a scheduler.
///
/// ```
/// use lapse_timer::{Clock, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now(), Duration::from_millis(250));
/// ```
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    now: Arc<Mutex<Duration>>,
}

impl VirtualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock already at `start`
    pub fn starting_at(start: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward by `by`, returning the new time
    pub fn advance(&self, by: Duration) -> Duration {
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
        *now
    }

    /// Jump to `to`. Moving backwards is ignored.
    pub fn set(&self, to: Duration) {
        let mut now = self.now.lock();
        if to > *now {
            *now = to;
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_only_moves_when_told() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_virtual_clock_clones_share_time() {
        let clock = VirtualClock::starting_at(Duration::from_secs(1));
        let other = clock.clone();

        other.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_virtual_clock_never_goes_backwards() {
        let clock = VirtualClock::new();
        clock.set(Duration::from_millis(500));
        clock.set(Duration::from_millis(200));
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
