//! Resolution guarantees of `TimeoutSelector` under virtual time

use lapse_core::testing::CallRecorder;
use lapse_core::{Outcome, SelectorError, SelectorState, TimeoutSelector};
use lapse_timer::{TokioTimers, VirtualScheduler, MAX_FIRINGS};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_millis(5000);

fn four_choices(time: &VirtualScheduler, recorder: &CallRecorder<i32>) -> TimeoutSelector<i32> {
    TimeoutSelector::create(time.handle(), [1, 2, 3, 4], DEADLINE, recorder.callback()).unwrap()
}

#[test]
fn timeout_fires_after_deadline_with_no_selection() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let _selector = four_choices(&time, &on_resolve);

    time.advance_ms(100);
    assert!(on_resolve.is_empty());

    time.advance_ms(10_000);
    assert_eq!(on_resolve.calls(), vec![Outcome::TimedOut]);
}

#[test]
fn timeout_fires_at_exactly_the_deadline_and_not_before() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let _selector = four_choices(&time, &on_resolve);

    time.advance(DEADLINE - Duration::from_millis(1));
    assert!(on_resolve.is_empty());

    time.advance_ms(1);
    assert_eq!(on_resolve.calls(), vec![Outcome::TimedOut]);

    time.advance_ms(60_000);
    assert_eq!(on_resolve.count(), 1);
}

#[test]
fn selection_preempts_timeout() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let selector = four_choices(&time, &on_resolve);

    assert_eq!(selector.select(&2), Ok(true));
    assert_eq!(on_resolve.calls(), vec![Outcome::Selected(2)]);

    time.advance_ms(10_000);
    assert_eq!(on_resolve.calls(), vec![Outcome::Selected(2)]);
}

#[test]
fn teardown_suppresses_timeout() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let selector = four_choices(&time, &on_resolve);

    time.advance_ms(4_999);
    selector.teardown();
    time.advance_ms(10_000);

    assert!(on_resolve.is_empty());
    assert_eq!(selector.state(), SelectorState::TornDown);
}

#[test]
fn teardown_is_idempotent() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();

    let torn = four_choices(&time, &on_resolve);
    torn.teardown();
    torn.teardown();

    let resolved = four_choices(&time, &on_resolve);
    resolved.select(&4).unwrap();
    resolved.teardown();
    resolved.teardown();

    time.advance_ms(10_000);
    assert_eq!(on_resolve.calls(), vec![Outcome::Selected(4)]);
    assert_eq!(resolved.state(), SelectorState::Resolved);
}

#[test]
fn selection_inside_deadline_tick_loses_to_timeout() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let selector = four_choices(&time, &on_resolve);

    time.advance(DEADLINE);
    assert_eq!(selector.select(&1), Ok(false));
    assert_eq!(on_resolve.calls(), vec![Outcome::TimedOut]);
}

#[test]
fn independent_selectors_share_one_scheduler() {
    let time = VirtualScheduler::new();
    let first = CallRecorder::new();
    let second = CallRecorder::new();

    let a = TimeoutSelector::create(
        time.handle(),
        ["x", "y"],
        Duration::from_secs(1),
        first.callback(),
    )
    .unwrap();
    let _b = TimeoutSelector::create(
        time.handle(),
        ["x", "y"],
        Duration::from_secs(2),
        second.callback(),
    )
    .unwrap();
    assert_eq!(time.pending_count(), 2);

    a.select(&"y").unwrap();
    assert_eq!(time.pending_count(), 1);

    time.advance(Duration::from_secs(3));
    assert_eq!(first.calls(), vec![Outcome::Selected("y")]);
    assert_eq!(second.calls(), vec![Outcome::TimedOut]);
}

#[test]
fn every_selector_times_out_when_many_share_a_deadline() {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let selectors: Vec<_> = (0..MAX_FIRINGS + 1)
        .map(|_| four_choices(&time, &on_resolve))
        .collect();

    time.advance(DEADLINE);

    assert_eq!(on_resolve.count(), MAX_FIRINGS + 1);
    assert!(selectors
        .iter()
        .all(|selector| selector.outcome() == Some(Outcome::TimedOut)));
    assert_eq!(time.pending_count(), 0);
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Select(i32),
    Teardown,
    Advance(u64),
}

const OPS: [Op; 7] = [
    Op::Select(1),
    Op::Select(2),
    Op::Select(9),
    Op::Teardown,
    Op::Advance(100),
    Op::Advance(4_900),
    Op::Advance(10_000),
];

/// Reference model: what the callback log must contain after `ops`
fn expected(ops: &[Op]) -> (SelectorState, Vec<Outcome<i32>>) {
    let mut state = SelectorState::Pending;
    let mut calls = Vec::new();
    let mut elapsed = 0;

    for op in ops {
        if state.is_terminal() {
            continue;
        }
        match *op {
            Op::Select(choice) if (1..=4).contains(&choice) => {
                state = SelectorState::Resolved;
                calls.push(Outcome::Selected(choice));
            }
            Op::Select(_) => {}
            Op::Teardown => state = SelectorState::TornDown,
            Op::Advance(ms) => {
                elapsed += ms;
                if elapsed >= DEADLINE.as_millis() as u64 {
                    state = SelectorState::Resolved;
                    calls.push(Outcome::TimedOut);
                }
            }
        }
    }
    (state, calls)
}

fn run(ops: &[Op]) {
    let time = VirtualScheduler::new();
    let on_resolve = CallRecorder::new();
    let selector = four_choices(&time, &on_resolve);

    for op in ops {
        match *op {
            Op::Select(choice) => {
                let result = selector.select(&choice);
                if (1..=4).contains(&choice) {
                    assert!(result.is_ok(), "{ops:?}");
                } else {
                    assert!(
                        matches!(result, Err(SelectorError::InvalidArgument(_))),
                        "{ops:?}"
                    );
                }
            }
            Op::Teardown => selector.teardown(),
            Op::Advance(ms) => {
                time.advance_ms(ms);
            }
        }
    }
    // Anything left pending must stay silent or resolve once
    time.advance_ms(60_000);

    let (mut state, mut calls) = expected(ops);
    if state == SelectorState::Pending {
        state = SelectorState::Resolved;
        calls.push(Outcome::TimedOut);
    }

    assert!(on_resolve.count() <= 1, "{ops:?}");
    assert_eq!(selector.state(), state, "{ops:?}");
    assert_eq!(on_resolve.calls(), calls, "{ops:?}");
    assert_eq!(time.pending_count(), 0, "{ops:?}");
}

#[test]
fn every_short_operation_sequence_resolves_at_most_once() {
    for a in OPS {
        run(&[a]);
        for b in OPS {
            run(&[a, b]);
            for c in OPS {
                run(&[a, b, c]);
                for d in OPS {
                    run(&[a, b, c, d]);
                }
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn tokio_timers_drive_the_deadline() {
    let on_resolve = CallRecorder::new();
    let _selector = TimeoutSelector::create(
        TokioTimers::current().unwrap(),
        [1, 2, 3, 4],
        DEADLINE,
        on_resolve.callback(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(on_resolve.is_empty());

    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(on_resolve.calls(), vec![Outcome::TimedOut]);
}

#[tokio::test(start_paused = true)]
async fn tokio_timers_selection_cancels_the_deadline() {
    let on_resolve = CallRecorder::new();
    let selector = TimeoutSelector::create(
        TokioTimers::current().unwrap(),
        [1, 2, 3, 4],
        DEADLINE,
        on_resolve.callback(),
    )
    .unwrap();

    assert_eq!(selector.select(&2), Ok(true));
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(on_resolve.calls(), vec![Outcome::Selected(2)]);
}
