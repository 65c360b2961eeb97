//! Error types for lapse_core

use lapse_timer::TimerError;
use thiserror::Error;

/// Errors raised by selector operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Caller broke an operation's precondition
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The scheduling collaborator is unavailable
    #[error(transparent)]
    Timer(#[from] TimerError),
}

/// Result type for lapse_core operations
pub type Result<T> = std::result::Result<T, SelectorError>;
