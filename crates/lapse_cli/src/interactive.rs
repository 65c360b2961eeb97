//! Real-time selector session
//!
//! Presents the configured choices, reads one choice per line, and ends when
//! the selector resolves or the input closes.

use crate::config::LapseConfig;
use anyhow::Result;
use lapse_core::{Outcome, SelectorError, TimeoutSelector};
use lapse_timer::TimerScheduler;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::thread;

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Resolved(Outcome<String>),
    /// Input closed before anything resolved
    TornDown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Resolved(Outcome::Selected(choice)) => write!(f, "selected {}", choice),
            SessionEnd::Resolved(Outcome::TimedOut) => f.write_str("timed out"),
            SessionEnd::TornDown => f.write_str("torn down"),
        }
    }
}

enum Event {
    Line(String),
    InputClosed,
    Resolved(Outcome<String>),
}

/// Run one selector on wall-clock time, reading choices from `input`
pub fn run_session<R, W>(config: &LapseConfig, input: R, out: &mut W) -> Result<SessionEnd>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let mut scheduler = TimerScheduler::new();
    scheduler.set_resolution(config.resolution());
    scheduler.start_background();

    let (tx, rx) = mpsc::channel();

    let resolved_tx = tx.clone();
    let selector = TimeoutSelector::create(
        scheduler.handle(),
        config.selector.choices.iter().cloned(),
        config.deadline(),
        move |outcome| {
            let _ = resolved_tx.send(Event::Resolved(outcome));
        },
    )?;

    writeln!(
        out,
        "Choose one of [{}] within {} ms:",
        selector.choices().join(", "),
        config.selector.deadline_ms
    )?;
    out.flush()?;

    thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::InputClosed);
    });

    let end = loop {
        let Ok(event) = rx.recv() else {
            break finish(&selector);
        };

        match event {
            Event::Resolved(outcome) => break SessionEnd::Resolved(outcome),
            Event::InputClosed => break finish(&selector),
            Event::Line(line) => {
                let choice = line.trim().to_string();
                if choice.is_empty() {
                    continue;
                }
                match selector.select(&choice) {
                    Ok(_) => {
                        if let Some(outcome) = selector.outcome() {
                            break SessionEnd::Resolved(outcome);
                        }
                    }
                    Err(SelectorError::InvalidArgument(reason)) => {
                        tracing::warn!("Ignoring input: {}", reason);
                        writeln!(out, "'{}' is not a choice", choice)?;
                        out.flush()?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    };

    scheduler.stop_background();
    writeln!(out, "{}", end)?;
    Ok(end)
}

/// Tear down and report how the selector ended; the deadline may have won
/// the race with closed input
fn finish(selector: &TimeoutSelector<String>) -> SessionEnd {
    selector.teardown();
    match selector.outcome() {
        Some(outcome) => SessionEnd::Resolved(outcome),
        None => SessionEnd::TornDown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn config(deadline_ms: u64) -> LapseConfig {
        LapseConfig::default().with_overrides(None, Some(deadline_ms))
    }

    /// Input that stays open until the sender is dropped
    struct HeldOpen(mpsc::Receiver<u8>);

    impl Read for HeldOpen {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_selection_from_input() {
        let mut out = Vec::new();
        let end = run_session(&config(60_000), Cursor::new("\n9\n2\n"), &mut out).unwrap();

        assert_eq!(end, SessionEnd::Resolved(Outcome::Selected("2".to_string())));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("'9' is not a choice"));
        assert!(printed.ends_with("selected 2\n"));
    }

    #[test]
    fn test_closed_input_tears_down() {
        let mut out = Vec::new();
        let end = run_session(&config(60_000), Cursor::new(""), &mut out).unwrap();
        assert_eq!(end, SessionEnd::TornDown);
    }

    #[test]
    fn test_deadline_on_real_time() {
        let (_keep_open, rx) = mpsc::channel();
        let input = std::io::BufReader::new(HeldOpen(rx));

        let mut out = Vec::new();
        let end = run_session(&config(20), input, &mut out).unwrap();
        assert_eq!(end, SessionEnd::Resolved(Outcome::TimedOut));
    }
}
