//! Test hooks
//!
//! [`CallRecorder`] stands in for a selector's `on_resolve` and remembers
//! every invocation, so tests can assert on how many times a callback ran
//! and with what.

use crate::outcome::Outcome;
use parking_lot::Mutex;
use std::sync::Arc;

/// A recording mock callback
///
/// Clones share the same call log.
pub struct CallRecorder<T> {
    calls: Arc<Mutex<Vec<Outcome<T>>>>,
}

impl<T: Send + 'static> CallRecorder<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A callback that appends its argument to this recorder's log
    pub fn callback(&self) -> impl FnOnce(Outcome<T>) + Send + 'static {
        let calls = Arc::clone(&self.calls);
        move |outcome| calls.lock().push(outcome)
    }

    /// Number of recorded invocations
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl<T: Clone + Send + 'static> CallRecorder<T> {
    /// Every recorded invocation, oldest first
    pub fn calls(&self) -> Vec<Outcome<T>> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<Outcome<T>> {
        self.calls.lock().last().cloned()
    }
}

impl<T: Send + 'static> Default for CallRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CallRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_shares_log_across_clones() {
        let recorder = CallRecorder::new();
        let other = recorder.clone();

        (recorder.callback())(Outcome::Selected(1));
        (other.callback())(Outcome::TimedOut);

        assert_eq!(recorder.count(), 2);
        assert_eq!(other.last(), Some(Outcome::TimedOut));
        assert_eq!(
            recorder.calls(),
            vec![Outcome::Selected(1), Outcome::TimedOut]
        );
    }
}
