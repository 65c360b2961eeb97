//! Timer error types

use thiserror::Error;

/// Errors raised by the scheduling layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The scheduler behind a weak handle has been dropped
    #[error("timer scheduler has been dropped")]
    SchedulerDropped,

    /// No async runtime is available to drive timers
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// Timers kept rescheduling themselves while running to completion
    #[error("aborted after firing {limit} timers; a timer keeps rescheduling itself")]
    RunawayTimers { limit: usize },
}

/// Result type for timer operations
pub type Result<T> = std::result::Result<T, TimerError>;
