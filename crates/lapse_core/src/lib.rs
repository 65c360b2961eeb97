//! Lapse Core
//!
//! A choice prompt with a deadline, built for UI components and for
//! deterministic testing of them.
//!
//! - **TimeoutSelector**: resolves exactly once, with a choice or a timeout
//! - **SelectorState**: `Pending -> Resolved | TornDown`
//! - **Outcome**: the resolution payload, `Selected(choice)` or `TimedOut`
//! - **CallRecorder**: mock `on_resolve` for tests
//!
//! Scheduling comes from any [`lapse_timer::TimerService`]; tests use a
//! [`lapse_timer::VirtualScheduler`] and advance time by hand.
//!
//! # Example
//!
//! ```rust
//! use lapse_core::{testing::CallRecorder, Outcome, TimeoutSelector};
//! use lapse_timer::VirtualScheduler;
//! use std::time::Duration;
//!
//! let time = VirtualScheduler::new();
//! let on_resolve = CallRecorder::new();
//!
//! let _selector = TimeoutSelector::create(
//!     time.handle(),
//!     [1, 2, 3, 4],
//!     Duration::from_millis(5000),
//!     on_resolve.callback(),
//! )
//! .unwrap();
//!
//! time.advance(Duration::from_millis(100));
//! assert!(on_resolve.is_empty());
//!
//! time.advance(Duration::from_millis(10_000));
//! assert_eq!(on_resolve.calls(), vec![Outcome::TimedOut]);
//! ```

pub mod error;
pub mod outcome;
pub mod selector;
pub mod state;
pub mod testing;

pub use error::{Result, SelectorError};
pub use outcome::Outcome;
pub use selector::{ResolveCallback, TimeoutSelector};
pub use state::SelectorState;
