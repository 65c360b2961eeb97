//! Timer service on a tokio runtime
//!
//! Each timer is a spawned task sleeping on `tokio::time`. Under
//! `#[tokio::test(start_paused = true)]` that sleep runs on tokio's paused
//! clock, so the same component code can be tested without real delays.

use crate::error::{Result, TimerError};
use crate::scheduler::{TimerCallback, TimerId};
use crate::service::TimerService;
use parking_lot::Mutex;
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

type TaskTable = Arc<Mutex<SlotMap<TimerId, Option<AbortHandle>>>>;

/// A [`TimerService`] that spawns one sleeping task per timer
pub struct TokioTimers {
    runtime: Handle,
    /// Pending timers. A task only fires if it can still remove its own entry.
    tasks: TaskTable,
}

impl TokioTimers {
    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| TimerError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(runtime))
    }

    /// Use an explicit runtime handle
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Number of timers waiting to fire
    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if a timer is still waiting to fire
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.tasks.lock().contains_key(id)
    }
}

impl TimerService for TokioTimers {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> Result<TimerId> {
        let id = self.tasks.lock().insert(None);
        let table = Arc::clone(&self.tasks);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Claim the entry; a cancelled timer is already gone
            let claimed = table.lock().remove(id).is_some();
            if claimed {
                tracing::trace!(timer = id.to_raw(), "tokio timer fired");
                callback();
            }
        });

        if let Some(slot) = self.tasks.lock().get_mut(id) {
            *slot = Some(task.abort_handle());
        }
        Ok(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.tasks.lock().remove(id);
        match removed {
            Some(abort) => {
                if let Some(abort) = abort {
                    abort.abort();
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, abort) in self.tasks.lock().drain() {
            if let Some(abort) = abort {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bump(count: &Arc<AtomicUsize>) -> TimerCallback {
        let count = Arc::clone(count);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_requires_a_runtime() {
        assert!(matches!(
            TokioTimers::current(),
            Err(TimerError::NoRuntime(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let timers = TokioTimers::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let id = timers
            .schedule_after(Duration::from_millis(5000), bump(&count))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(timers.is_pending(id));

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timers.is_pending(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let timers = TokioTimers::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let id = timers
            .schedule_after(Duration::from_millis(5000), bump(&count))
            .unwrap();
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending_count(), 0);
    }
}
