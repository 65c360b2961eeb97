//! Selector lifecycle states

use serde::Serialize;
use std::fmt;

/// State of a timeout selector.
///
/// `Pending` is the only live state; the other two are terminal and every
/// later event on a terminal selector is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorState {
    /// Waiting for a choice; the deadline is scheduled.
    Pending,
    /// Resolved by a choice or by the deadline.
    Resolved,
    /// Torn down before resolving; will never resolve.
    TornDown,
}

impl SelectorState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SelectorState::Pending)
    }
}

impl fmt::Display for SelectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectorState::Pending => "pending",
            SelectorState::Resolved => "resolved",
            SelectorState::TornDown => "torn_down",
        };
        f.write_str(name)
    }
}
