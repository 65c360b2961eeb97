//! Selector resolution payload

use serde::Serialize;

/// What a selector resolved with
///
/// `TimedOut` is the sentinel for "no choice arrived before the deadline".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "choice")]
pub enum Outcome<T> {
    /// The caller picked one of the configured choices
    Selected(T),
    /// The deadline elapsed first
    TimedOut,
}

impl<T> Outcome<T> {
    /// The selected choice, if any
    pub fn choice(&self) -> Option<&T> {
        match self {
            Outcome::Selected(choice) => Some(choice),
            Outcome::TimedOut => None,
        }
    }

    /// Collapse to the nullable view: `None` means timed out
    pub fn into_choice(self) -> Option<T> {
        match self {
            Outcome::Selected(choice) => Some(choice),
            Outcome::TimedOut => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(choice: Option<T>) -> Self {
        choice.map_or(Outcome::TimedOut, Outcome::Selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_view() {
        assert_eq!(Outcome::Selected(2).into_choice(), Some(2));
        assert_eq!(Outcome::<i32>::TimedOut.into_choice(), None);
        assert_eq!(Outcome::from(None::<i32>), Outcome::TimedOut);
        assert!(Outcome::<i32>::TimedOut.is_timeout());
        assert_eq!(Outcome::Selected("a").choice(), Some(&"a"));
    }
}
