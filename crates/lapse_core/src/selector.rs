//! Timeout selector
//!
//! Presents a fixed set of choices and resolves exactly once: with the
//! caller's choice, or with [`Outcome::TimedOut`] when the deadline elapses
//! first. Tearing the selector down (or dropping it) cancels the deadline
//! without resolving.
//!
//! ```
//! use lapse_core::{Outcome, TimeoutSelector};
//! use lapse_timer::VirtualScheduler;
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! let time = VirtualScheduler::new();
//! let (tx, rx) = mpsc::channel();
//!
//! let selector = TimeoutSelector::create(
//!     time.handle(),
//!     [1, 2, 3, 4],
//!     Duration::from_secs(5),
//!     move |outcome| tx.send(outcome).unwrap(),
//! )
//! .unwrap();
//!
//! assert_eq!(selector.select(&2), Ok(true));
//! time.advance(Duration::from_secs(10));
//!
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Outcome::Selected(2)]);
//! ```

use crate::error::{Result, SelectorError};
use crate::outcome::Outcome;
use crate::state::SelectorState;
use lapse_timer::{TimerHandle, TimerId, TimerService};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Single-use resolution callback
pub type ResolveCallback<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// Mutable selector state, shared with the deadline callback
struct SelectorInner<T> {
    state: SelectorState,
    /// Pending deadline; only set while `Pending`
    timer: Option<TimerId>,
    /// Taken on resolution or teardown, so it can run at most once
    on_resolve: Option<ResolveCallback<T>>,
    outcome: Option<Outcome<T>>,
}

impl<T: Clone> SelectorInner<T> {
    /// Move `Pending -> Resolved`, handing back the callback to run once the
    /// lock is released
    fn resolve(&mut self, outcome: &Outcome<T>) -> Option<ResolveCallback<T>> {
        self.state = SelectorState::Resolved;
        self.timer = None;
        self.outcome = Some(outcome.clone());
        self.on_resolve.take()
    }
}

/// A choice prompt that resolves exactly once or not at all
///
/// The selector exclusively owns its deadline timer and its callback.
/// `on_resolve` always runs with no internal lock held, so it may call back
/// into the selector or schedule new timers.
pub struct TimeoutSelector<T, S = TimerHandle>
where
    T: Clone + PartialEq + fmt::Debug + Send + 'static,
    S: TimerService,
{
    choices: SmallVec<[T; 4]>,
    deadline: Duration,
    timers: S,
    inner: Arc<Mutex<SelectorInner<T>>>,
}

impl<T, S> TimeoutSelector<T, S>
where
    T: Clone + PartialEq + fmt::Debug + Send + 'static,
    S: TimerService,
{
    /// Create a live selector and schedule its deadline
    ///
    /// Fails with [`SelectorError::InvalidArgument`] when `choices` is empty
    /// or contains duplicates, and with [`SelectorError::Timer`] when the
    /// scheduler is gone. On failure `on_resolve` is dropped uncalled.
    ///
    /// A zero `deadline` is allowed; it fires on the scheduler's next tick,
    /// never inside `create`.
    pub fn create<I, F>(timers: S, choices: I, deadline: Duration, on_resolve: F) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let choices: SmallVec<[T; 4]> = choices.into_iter().collect();
        validate_choices(&choices)?;

        let inner = Arc::new(Mutex::new(SelectorInner {
            state: SelectorState::Pending,
            timer: None,
            on_resolve: Some(Box::new(on_resolve)),
            outcome: None,
        }));

        let weak = Arc::downgrade(&inner);
        let timer = timers.schedule_after(deadline, Box::new(move || on_deadline(&weak)))?;

        {
            let mut guard = inner.lock();
            // A background scheduler may already have fired a zero deadline
            if guard.state == SelectorState::Pending {
                guard.timer = Some(timer);
            }
        }

        tracing::debug!(
            choices = choices.len(),
            deadline_ms = deadline.as_millis() as u64,
            timer = timer.to_raw(),
            "TimeoutSelector: created"
        );

        Ok(Self {
            choices,
            deadline,
            timers,
            inner,
        })
    }

    /// Resolve with `choice`
    ///
    /// Returns `Ok(true)` if this call resolved the selector and `Ok(false)`
    /// if it was already resolved or torn down. A choice outside the
    /// configured set is rejected in every state.
    pub fn select(&self, choice: &T) -> Result<bool> {
        if !self.choices.contains(choice) {
            return Err(SelectorError::InvalidArgument(format!(
                "{:?} is not one of {:?}",
                choice,
                self.choices.as_slice()
            )));
        }

        let outcome = Outcome::Selected(choice.clone());
        let (timer, callback) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                tracing::trace!(state = %inner.state, "TimeoutSelector: select ignored");
                return Ok(false);
            }
            let timer = inner.timer.take();
            (timer, inner.resolve(&outcome))
        };

        if let Some(id) = timer {
            self.timers.cancel(id);
        }

        tracing::debug!(?choice, "TimeoutSelector: resolved by selection");
        if let Some(callback) = callback {
            callback(outcome);
        }
        Ok(true)
    }

    /// End the selector's lifetime without resolving
    ///
    /// Cancels the pending deadline and drops `on_resolve` uncalled.
    /// Safe to call any number of times, before or after resolution.
    pub fn teardown(&self) {
        let (timer, callback) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = SelectorState::TornDown;
            (inner.timer.take(), inner.on_resolve.take())
        };

        if let Some(id) = timer {
            self.timers.cancel(id);
        }
        drop(callback);

        tracing::debug!("TimeoutSelector: torn down");
    }

    pub fn state(&self) -> SelectorState {
        self.inner.lock().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == SelectorState::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == SelectorState::Resolved
    }

    /// The outcome this selector resolved with, if it has
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.inner.lock().outcome.clone()
    }

    pub fn choices(&self) -> &[T] {
        &self.choices
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl<T, S> Drop for TimeoutSelector<T, S>
where
    T: Clone + PartialEq + fmt::Debug + Send + 'static,
    S: TimerService,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<T, S> fmt::Debug for TimeoutSelector<T, S>
where
    T: Clone + PartialEq + fmt::Debug + Send + 'static,
    S: TimerService,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutSelector")
            .field("choices", &self.choices.as_slice())
            .field("deadline", &self.deadline)
            .field("state", &self.state())
            .finish()
    }
}

fn validate_choices<T: PartialEq + fmt::Debug>(choices: &[T]) -> Result<()> {
    if choices.is_empty() {
        return Err(SelectorError::InvalidArgument(
            "choices must not be empty".to_string(),
        ));
    }
    for (i, choice) in choices.iter().enumerate() {
        if choices[..i].contains(choice) {
            return Err(SelectorError::InvalidArgument(format!(
                "duplicate choice {:?}",
                choice
            )));
        }
    }
    Ok(())
}

/// Deadline path, run by the scheduler
fn on_deadline<T: Clone>(inner: &Weak<Mutex<SelectorInner<T>>>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let outcome = Outcome::TimedOut;
    let callback = {
        let mut guard = inner.lock();
        if guard.state.is_terminal() {
            return;
        }
        guard.resolve(&outcome)
    };

    tracing::debug!("TimeoutSelector: resolved by deadline");
    if let Some(callback) = callback {
        callback(outcome);
    }
}
