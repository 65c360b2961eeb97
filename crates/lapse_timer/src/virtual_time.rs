//! Virtual time
//!
//! [`VirtualScheduler`] pairs a [`TimerScheduler`] with a [`VirtualClock`] so
//! tests can trigger or avoid deadlines deterministically, without waiting
//! on wall-clock time.
//!
//! ```
//! use lapse_timer::{TimerService, VirtualScheduler};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let time = VirtualScheduler::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = fired.clone();
//! time.handle()
//!     .schedule_after(Duration::from_secs(5), Box::new(move || flag.store(true, Ordering::SeqCst)))
//!     .unwrap();
//!
//! time.advance(Duration::from_millis(4999));
//! assert!(!fired.load(Ordering::SeqCst));
//! time.advance(Duration::from_millis(1));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use crate::clock::{Clock, VirtualClock};
use crate::error::{Result, TimerError};
use crate::scheduler::{TimerCallback, TimerHandle, TimerId, TimerScheduler};
use crate::service::TimerService;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on timers a single `advance` or `run_pending` call will fire
/// when they were scheduled during that same call
///
/// Timers already pending when the call starts are never counted, so any
/// number of ordinary deadlines can come due in one advance.
pub const MAX_FIRINGS: usize = 10_000;

/// A timer scheduler driven by manual time advance
pub struct VirtualScheduler {
    clock: VirtualClock,
    scheduler: TimerScheduler,
}

impl VirtualScheduler {
    /// Create a scheduler with virtual time at zero
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::new())
    }

    /// Create a scheduler on an existing virtual clock
    pub fn with_clock(clock: VirtualClock) -> Self {
        let scheduler = TimerScheduler::with_clock(Arc::new(clock.clone()));
        Self { clock, scheduler }
    }

    /// Get a weak handle for passing to components
    pub fn handle(&self) -> TimerHandle {
        self.scheduler.handle()
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &TimerScheduler {
        &self.scheduler
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Number of timers waiting to fire
    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Move virtual time forward by `by`, firing every timer that falls due
    ///
    /// The clock steps to each timer's deadline before that timer fires, so
    /// a callback observes the time it was due at and anything it schedules
    /// is placed relative to that. Afterwards the clock rests at exactly
    /// `now + by`. Returns the number of timers fired.
    ///
    /// If timers scheduled during the advance fire more than [`MAX_FIRINGS`]
    /// times, the advance stops with the clock at the last deadline fired,
    /// so nothing left pending is ever behind the clock.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.now().saturating_add(by);
        let horizon = self.scheduler.next_seq();
        let mut fired = 0;
        let mut rescheduled = 0;

        while let Some((id, entry)) = self.scheduler.pop_due(target) {
            self.clock.set(entry.due);
            tracing::trace!(
                timer = id.to_raw(),
                now_ms = entry.due.as_millis() as u64,
                "virtual timer fired"
            );
            if entry.seq >= horizon {
                rescheduled += 1;
            }
            entry.fire();
            fired += 1;

            if rescheduled >= MAX_FIRINGS {
                tracing::warn!(
                    limit = MAX_FIRINGS,
                    now_ms = self.clock.now().as_millis() as u64,
                    "VirtualScheduler: stopping advance, a timer keeps rescheduling itself"
                );
                return fired;
            }
        }

        self.clock.set(target);
        fired
    }

    /// Move virtual time forward by `ms` milliseconds
    pub fn advance_ms(&self, ms: u64) -> usize {
        self.advance(Duration::from_millis(ms))
    }

    /// Fire every pending timer, jumping time to each deadline in turn
    ///
    /// Fails if timers scheduled during the run fire more than
    /// [`MAX_FIRINGS`] times.
    pub fn run_pending(&self) -> Result<usize> {
        let horizon = self.scheduler.next_seq();
        let mut fired = 0;
        let mut rescheduled = 0;
        while let Some(due) = self.scheduler.next_deadline() {
            if rescheduled >= MAX_FIRINGS {
                return Err(TimerError::RunawayTimers { limit: MAX_FIRINGS });
            }
            let Some((_, entry)) = self.scheduler.pop_due(due) else {
                break;
            };
            self.clock.set(entry.due);
            if entry.seq >= horizon {
                rescheduled += 1;
            }
            entry.fire();
            fired += 1;
        }
        Ok(fired)
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService for VirtualScheduler {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        Ok(self.scheduler.schedule_after(delay, callback))
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.scheduler.cancel(id)
    }
}
