//! Scripted replay on virtual time
//!
//! Runs a selector against a [`VirtualScheduler`] and records what each step
//! did, so a scenario such as "advance 100ms, then 10s" can be checked
//! without waiting on a real clock.

use crate::config::LapseConfig;
use anyhow::Result;
use lapse_core::testing::CallRecorder;
use lapse_core::{Outcome, SelectorState, TimeoutSelector};
use lapse_timer::VirtualScheduler;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One scripted interaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// `advance:<ms>`
    Advance(u64),
    /// `select:<choice>`
    Select(String),
    /// `teardown`
    Teardown,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, arg) = match s.split_once(':') {
            Some((verb, arg)) => (verb.trim(), Some(arg.trim())),
            None => (s.trim(), None),
        };

        match (verb, arg) {
            ("advance", Some(ms)) => ms
                .parse()
                .map(Step::Advance)
                .map_err(|e| format!("invalid advance '{}': {}", ms, e)),
            ("select", Some(choice)) if !choice.is_empty() => Ok(Step::Select(choice.to_string())),
            ("teardown", None) => Ok(Step::Teardown),
            _ => Err(format!(
                "invalid step '{}'. Expected advance:<ms>, select:<choice> or teardown",
                s
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Advance(ms) => write!(f, "advance:{}", ms),
            Step::Select(choice) => write!(f, "select:{}", choice),
            Step::Teardown => f.write_str("teardown"),
        }
    }
}

/// What happened during a single step
#[derive(Debug, Serialize)]
pub struct StepRecord {
    pub step: String,
    /// Virtual time after the step
    pub at_ms: u64,
    pub state: SelectorState,
    /// Callback invocation produced by this step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Outcome<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full replay result
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub choices: Vec<String>,
    pub deadline_ms: u64,
    pub steps: Vec<StepRecord>,
    pub final_state: SelectorState,
    pub outcome: Option<Outcome<String>>,
    /// Total callback invocations; never more than one
    pub invocations: usize,
}

/// Replay `steps` against a fresh selector built from `config`
pub fn simulate(config: &LapseConfig, steps: &[Step]) -> Result<SimulationReport> {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();

    let selector = TimeoutSelector::create(
        time.handle(),
        config.selector.choices.iter().cloned(),
        config.deadline(),
        on_resolve.callback(),
    )?;

    let mut records = Vec::with_capacity(steps.len());
    for step in steps {
        let before = on_resolve.count();
        let mut error = None;

        match step {
            Step::Advance(ms) => {
                time.advance(Duration::from_millis(*ms));
            }
            Step::Select(choice) => {
                if let Err(e) = selector.select(choice) {
                    tracing::warn!("Step {} rejected: {}", step, e);
                    error = Some(e.to_string());
                }
            }
            Step::Teardown => selector.teardown(),
        }

        records.push(StepRecord {
            step: step.to_string(),
            at_ms: time.now().as_millis() as u64,
            state: selector.state(),
            resolved: on_resolve.calls().get(before).cloned(),
            error,
        });
    }

    Ok(SimulationReport {
        choices: selector.choices().to_vec(),
        deadline_ms: config.selector.deadline_ms,
        steps: records,
        final_state: selector.state(),
        outcome: selector.outcome(),
        invocations: on_resolve.count(),
    })
}
