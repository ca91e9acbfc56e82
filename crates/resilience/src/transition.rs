//! Circuit breaker state machine as a pure function.
//!
//! `transition` never reads a clock and never sleeps. The caller passes in
//! the current instant, which keeps every transition reproducible in tests.
//!
//! ```text
//!  CLOSED ── rate >= threshold ──► OPEN ── wait elapsed, next acquire ──► HALF_OPEN
//!    ▲                              ▲                                       │
//!    │                              └──────── failed or slow probes ────────┤
//!    └──────────────────────── all probes succeed ──────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::state::CircuitState;
use crate::window::{RecordedCall, SlidingWindow, percent};

/// Outcome of one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    pub failed: bool,
    pub duration: Duration,
}

impl CallOutcome {
    pub fn success(duration: Duration) -> Self {
        Self {
            failed: false,
            duration,
        }
    }

    pub fn failure(duration: Duration) -> Self {
        Self {
            failed: true,
            duration,
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerInput {
    /// A caller asks for permission to run a call.
    Acquire,
    /// A permitted call finished.
    Record(CallOutcome),
    /// Operator reset to CLOSED.
    Reset,
}

/// Everything the state machine remembers between inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakerState {
    pub state: CircuitState,
    /// Outcomes recorded while CLOSED. Kept while OPEN for reporting.
    pub window: SlidingWindow,
    pub opened_at: Option<Instant>,
    /// Probes handed out in the current HALF_OPEN period.
    pub probes_permitted: u32,
    /// Probes that finished successfully in the current HALF_OPEN period.
    pub probes_succeeded: u32,
    /// Successful probes that were slow.
    pub probes_slow: u32,
    /// Calls refused since the last reset.
    pub not_permitted: u64,
}

/// A change of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Result of feeding one input to [`transition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transitioned {
    pub state: BreakerState,
    /// For `Acquire`, whether the call may proceed. True for other inputs.
    pub permitted: bool,
    pub change: Option<StateChange>,
}

/// Computes the next breaker state.
pub fn transition(
    mut state: BreakerState,
    input: BreakerInput,
    config: &CircuitBreakerConfig,
    now: Instant,
) -> Transitioned {
    let from = state.state;
    let permitted = match input {
        BreakerInput::Acquire => acquire(&mut state, config, now),
        BreakerInput::Record(outcome) => {
            record(&mut state, outcome, config, now);
            true
        }
        BreakerInput::Reset => {
            state = BreakerState::default();
            true
        }
    };

    let change = (state.state != from).then_some(StateChange {
        from,
        to: state.state,
    });

    Transitioned {
        state,
        permitted,
        change,
    }
}

fn acquire(state: &mut BreakerState, config: &CircuitBreakerConfig, now: Instant) -> bool {
    match state.state {
        CircuitState::Closed => true,
        CircuitState::Open => {
            let waited = state
                .opened_at
                .map(|at| now.saturating_duration_since(at) >= config.wait_duration_in_open)
                .unwrap_or(true);
            if waited {
                enter_half_open(state);
                state.probes_permitted = 1;
                true
            } else {
                state.not_permitted += 1;
                false
            }
        }
        CircuitState::HalfOpen => {
            if state.probes_permitted < config.permitted_probe_calls {
                state.probes_permitted += 1;
                true
            } else {
                state.not_permitted += 1;
                false
            }
        }
    }
}

fn record(
    state: &mut BreakerState,
    outcome: CallOutcome,
    config: &CircuitBreakerConfig,
    now: Instant,
) {
    let slow = outcome.duration >= config.slow_call_duration;
    match state.state {
        CircuitState::Closed => {
            state.window.push(
                RecordedCall {
                    failed: outcome.failed,
                    slow,
                },
                config.sliding_window_size,
            );
            if state.window.len() >= config.effective_minimum_calls()
                && (state.window.failure_rate() >= config.failure_rate_threshold
                    || state.window.slow_call_rate() >= config.slow_call_rate_threshold)
            {
                enter_open(state, now);
            }
        }
        // Late results from calls permitted before the breaker opened.
        CircuitState::Open => {}
        CircuitState::HalfOpen => {
            if outcome.failed {
                enter_open(state, now);
                return;
            }
            state.probes_succeeded += 1;
            state.probes_slow += u32::from(slow);
            if state.probes_succeeded >= config.permitted_probe_calls {
                let slow_rate = percent(
                    state.probes_slow as usize,
                    state.probes_succeeded as usize,
                );
                if slow_rate >= config.slow_call_rate_threshold {
                    enter_open(state, now);
                } else {
                    enter_closed(state);
                }
            }
        }
    }
}

fn enter_open(state: &mut BreakerState, now: Instant) {
    state.state = CircuitState::Open;
    state.opened_at = Some(now);
    reset_probes(state);
}

fn enter_half_open(state: &mut BreakerState) {
    state.state = CircuitState::HalfOpen;
    reset_probes(state);
}

fn enter_closed(state: &mut BreakerState) {
    state.state = CircuitState::Closed;
    state.opened_at = None;
    state.window.clear();
    reset_probes(state);
}

fn reset_probes(state: &mut BreakerState) {
    state.probes_permitted = 0;
    state.probes_succeeded = 0;
    state.probes_slow = 0;
}
