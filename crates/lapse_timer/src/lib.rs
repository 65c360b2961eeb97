//! Lapse Timers
//!
//! Cancellable deferred invocations for UI components and their tests.
//!
//! # Features
//!
//! - **TimerScheduler**: slotmap-backed timer table, fired by `tick()` or a
//!   background thread
//! - **TimerHandle**: weak handle components use to schedule and cancel
//! - **Clocks**: wall-clock [`SystemClock`] and controllable [`VirtualClock`]
//! - **VirtualScheduler**: manual time advance for deterministic tests
//! - **TokioTimers**: the same service on a tokio runtime (`tokio` feature)
//!
//! Cancellation is final: once `cancel` returns, the callback never runs,
//! even if its deadline was reached in the same tick.

pub mod clock;
pub mod error;
pub mod scheduler;
pub mod service;
#[cfg(feature = "tokio")]
pub mod tokio_timers;
pub mod virtual_time;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use error::{Result, TimerError};
pub use scheduler::{TimerCallback, TimerHandle, TimerId, TimerScheduler, DEFAULT_RESOLUTION};
pub use service::TimerService;
#[cfg(feature = "tokio")]
pub use tokio_timers::TokioTimers;
pub use virtual_time::{VirtualScheduler, MAX_FIRINGS};
