//! Timer scheduler
//!
//! Owns every pending deferred invocation and fires them when their deadline
//! passes. The scheduler can be driven three ways:
//! - `tick()` from an existing event loop
//! - `start_background()` on its own thread, for real time
//! - through a [`VirtualScheduler`](crate::VirtualScheduler) in tests
//!
//! Components never hold the scheduler itself. They receive a
//! [`TimerHandle`], a weak reference that turns into a no-op once the
//! scheduler is dropped.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TimerError};
use crate::service::TimerService;
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

new_key_type! {
    /// Handle to a scheduled deferred invocation
    pub struct TimerId;
}

impl TimerId {
    /// Convert to raw u64 for logging or storage
    pub fn to_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }
}

/// A callback run once when its timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Default interval between background ticks
pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(1);

pub(crate) struct TimerEntry {
    pub(crate) due: Duration,
    /// Scheduling order, breaks ties between equal deadlines
    pub(crate) seq: u64,
    callback: TimerCallback,
}

impl TimerEntry {
    pub(crate) fn fire(self) {
        (self.callback)();
    }
}

/// Internal state of the timer scheduler
#[derive(Default)]
pub(crate) struct SchedulerInner {
    timers: SlotMap<TimerId, TimerEntry>,
    /// Firing order. Cancelled ids stay here until they reach the top.
    queue: BinaryHeap<Reverse<(Duration, u64, TimerId)>>,
    next_seq: u64,
}

impl SchedulerInner {
    fn insert(&mut self, due: Duration, callback: TimerCallback) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = self.timers.insert(TimerEntry { due, seq, callback });
        self.queue.push(Reverse((due, seq, id)));
        id
    }

    fn remove(&mut self, id: TimerId) -> bool {
        let removed = self.timers.remove(id).is_some();
        // Rebuild once cancelled ids dominate the queue
        if removed && self.queue.len() > 2 * self.timers.len() + 64 {
            let timers = &self.timers;
            self.queue.retain(|Reverse((_, _, id))| timers.contains_key(*id));
        }
        removed
    }

    fn next_due(&mut self) -> Option<(TimerId, Duration)> {
        while let Some(Reverse((due, _, id))) = self.queue.peek().copied() {
            if self.timers.contains_key(id) {
                return Some((id, due));
            }
            self.queue.pop();
        }
        None
    }

    /// Remove the earliest timer due at or before `until`
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<(TimerId, TimerEntry)> {
        let (id, due) = self.next_due()?;
        if due > until {
            return None;
        }
        self.queue.pop();
        self.timers.remove(id).map(|entry| (id, entry))
    }
}

/// Fire due timers one at a time.
///
/// The table lock is released before each callback runs, so callbacks may
/// schedule or cancel timers. A timer cancelled by an earlier callback is
/// already gone from the table and cannot fire.
fn run_due(inner: &Mutex<SchedulerInner>, until: Duration) -> usize {
    let mut fired = 0;
    loop {
        let next = inner.lock().pop_due(until);
        let Some((id, entry)) = next else {
            break;
        };
        tracing::trace!(
            timer = id.to_raw(),
            due_ms = entry.due.as_millis() as u64,
            "timer fired"
        );
        entry.fire();
        fired += 1;
    }
    fired
}

/// The scheduler that owns and fires all deferred invocations
///
/// ```
/// use lapse_timer::{TimerScheduler, VirtualClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// let scheduler = TimerScheduler::with_clock(Arc::new(clock.clone()));
/// scheduler.schedule_after(Duration::from_millis(50), Box::new(|| println!("ding")));
///
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(scheduler.tick(), 1);
/// ```
pub struct TimerScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    clock: Arc<dyn Clock>,
    /// Stop signal for background thread
    stop_flag: Arc<AtomicBool>,
    /// Sleep between background ticks
    resolution: Duration,
    /// Background thread handle (if running)
    thread_handle: Option<JoinHandle<()>>,
}

impl TimerScheduler {
    /// Create a scheduler on wall-clock time
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a scheduler reading deadlines from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
            clock,
            stop_flag: Arc::new(AtomicBool::new(false)),
            resolution: DEFAULT_RESOLUTION,
            thread_handle: None,
        }
    }

    /// Set the interval between background ticks
    ///
    /// Takes effect the next time the background thread is started.
    pub fn set_resolution(&mut self, resolution: Duration) {
        self.resolution = resolution;
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Start firing timers on a background thread
    ///
    /// The thread ticks every `resolution` until `stop_background()` is
    /// called or the scheduler is dropped. Callbacks run on that thread.
    pub fn start_background(&mut self) {
        if self.thread_handle.is_some() {
            return; // Already running
        }

        let inner = Arc::clone(&self.inner);
        let clock = Arc::clone(&self.clock);
        let stop_flag = Arc::clone(&self.stop_flag);
        let resolution = self.resolution;

        tracing::debug!(
            resolution_us = resolution.as_micros() as u64,
            "TimerScheduler: starting background thread"
        );

        self.thread_handle = Some(thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                run_due(&inner, clock.now());
                thread::sleep(resolution);
            }
        }));
    }

    /// Stop the background thread. No-op if this scheduler did not start one.
    pub fn stop_background(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = handle.join();
        self.stop_flag.store(false, Ordering::Relaxed);
        tracing::debug!("TimerScheduler: background thread stopped");
    }

    /// Check if the background thread is running
    pub fn is_background_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Get a weak handle to this scheduler for passing to components
    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            inner: Arc::downgrade(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }

    /// Current time on the scheduler's clock
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Schedule `callback` to run once, `delay` from now
    pub fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let due = self.clock.now().saturating_add(delay);
        self.inner.lock().insert(due, callback)
    }

    /// Cancel a pending timer. Returns `true` if it had not fired yet.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.inner.lock().remove(id)
    }

    /// Check if a timer is still waiting to fire
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.lock().timers.contains_key(id)
    }

    /// Number of timers waiting to fire
    pub fn pending_count(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.lock().next_due().map(|(_, due)| due)
    }

    /// Fire every timer due at or before `until`, earliest first
    ///
    /// Returns the number of timers fired.
    pub fn run_until(&self, until: Duration) -> usize {
        run_due(&self.inner, until)
    }

    /// Fire every timer that is due now
    pub fn tick(&self) -> usize {
        self.run_until(self.clock.now())
    }

    pub(crate) fn pop_due(&self, until: Duration) -> Option<(TimerId, TimerEntry)> {
        self.inner.lock().pop_due(until)
    }

    /// Sequence number the next scheduled timer will get
    pub(crate) fn next_seq(&self) -> u64 {
        self.inner.lock().next_seq
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TimerScheduler {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
            // Cloned scheduler doesn't own the background thread
            stop_flag: Arc::new(AtomicBool::new(false)),
            resolution: self.resolution,
            thread_handle: None,
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        // Stop background thread when scheduler is dropped
        if self.thread_handle.is_some() {
            self.stop_background();
        }
    }
}

impl TimerService for TimerScheduler {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        Ok(TimerScheduler::schedule_after(self, delay, callback))
    }

    fn cancel(&self, id: TimerId) -> bool {
        TimerScheduler::cancel(self, id)
    }
}

/// A weak handle to the timer scheduler
///
/// This is passed to components that need deferred invocations.
/// It won't prevent the scheduler from being dropped.
#[derive(Clone)]
pub struct TimerHandle {
    inner: Weak<Mutex<SchedulerInner>>,
    clock: Arc<dyn Clock>,
}

impl TimerHandle {
    /// Check if the scheduler is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Current time on the scheduler's clock
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Check if a timer is still waiting to fire
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().timers.contains_key(id))
            .unwrap_or(false)
    }

    /// Number of timers waiting to fire (zero once the scheduler is gone)
    pub fn pending_count(&self) -> usize {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().timers.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl TimerService for TimerHandle {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        let inner = self.inner.upgrade().ok_or(TimerError::SchedulerDropped)?;
        let due = self.clock.now().saturating_add(delay);
        let id = inner.lock().insert(due, callback);
        Ok(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().remove(id))
            .unwrap_or(false)
    }
}
