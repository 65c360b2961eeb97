//! The scheduling seam
//!
//! Components that need a deferred invocation depend on [`TimerService`]
//! rather than on a concrete scheduler, so the same component runs against
//! real time, a tokio runtime, or a [`VirtualScheduler`](crate::VirtualScheduler)
//! in tests.

use crate::error::Result;
use crate::scheduler::{TimerCallback, TimerId};
use std::sync::Arc;
use std::time::Duration;

/// "Schedule a callback after a duration" and "cancel it"
pub trait TimerService: Send + Sync {
    /// Schedule `callback` to run once, `delay` from now
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId>;

    /// Cancel a scheduled callback
    ///
    /// Returns `true` if the timer was still pending. Once this returns, the
    /// callback for `id` will never run.
    fn cancel(&self, id: TimerId) -> bool;
}

impl<S: TimerService + ?Sized> TimerService for Arc<S> {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        (**self).schedule_after(delay, callback)
    }

    fn cancel(&self, id: TimerId) -> bool {
        (**self).cancel(id)
    }
}

impl<S: TimerService + ?Sized> TimerService for &S {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        (**self).schedule_after(delay, callback)
    }

    fn cancel(&self, id: TimerId) -> bool {
        (**self).cancel(id)
    }
}
