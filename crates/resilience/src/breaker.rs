//! Thread-safe circuit breaker over the pure state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;
use crate::error::ConfigResult;
use crate::state::CircuitState;
use crate::transition::{BreakerInput, BreakerState, CallOutcome, StateChange, transition};

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Published whenever a breaker changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub name: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a breaker, for health and operator endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub successful_calls: usize,
    pub slow_calls: usize,
    pub not_permitted_calls: u64,
}

/// Circuit breaker for one named dependency.
///
/// Every input goes through a single mutex, so the sequence of states a
/// breaker passes through is the same for all observers.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
    transitions: broadcast::Sender<StateTransition>,
}

impl CircuitBreaker {
    /// Creates a breaker using the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a breaker with an explicit clock.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(name.into(), config, clock))
    }

    pub(crate) fn build(name: String, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        metrics::gauge!("circuit_breaker_state", "name" => name.clone())
            .set(f64::from(CircuitState::Closed.code()));
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(BreakerState::default()),
            transitions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Asks whether a call may proceed.
    ///
    /// A `true` answer while HALF_OPEN consumes one probe slot; the caller
    /// must report the outcome with `record_success` or `record_failure`.
    pub fn permit(&self) -> bool {
        let permitted = self.apply(BreakerInput::Acquire);
        if !permitted {
            metrics::counter!(
                "circuit_breaker_calls_total",
                "name" => self.name.clone(),
                "outcome" => "not_permitted"
            )
            .increment(1);
        }
        permitted
    }

    pub fn record_success(&self, duration: Duration) {
        self.record(CallOutcome::success(duration), "success");
    }

    pub fn record_failure(&self, duration: Duration) {
        self.record(CallOutcome::failure(duration), "failure");
    }

    /// Forces the breaker back to CLOSED and clears all counters.
    pub fn reset(&self) {
        self.apply(BreakerInput::Reset);
        tracing::info!(breaker = %self.name, "Circuit breaker reset");
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            failure_rate: inner.window.failure_rate(),
            slow_call_rate: inner.window.slow_call_rate(),
            buffered_calls: inner.window.len(),
            failed_calls: inner.window.failed(),
            successful_calls: inner.window.successful(),
            slow_calls: inner.window.slow(),
            not_permitted_calls: inner.not_permitted,
        }
    }

    /// Subscribes to state transitions of this breaker.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    fn record(&self, outcome: CallOutcome, label: &'static str) {
        metrics::counter!(
            "circuit_breaker_calls_total",
            "name" => self.name.clone(),
            "outcome" => label
        )
        .increment(1);
        metrics::histogram!("circuit_breaker_call_duration_seconds", "name" => self.name.clone())
            .record(outcome.duration.as_secs_f64());
        self.apply(BreakerInput::Record(outcome));
    }

    fn apply(&self, input: BreakerInput) -> bool {
        let mut inner = self.inner.lock();
        let current = std::mem::take(&mut *inner);
        let next = transition(current, input, &self.config, self.clock.now());
        *inner = next.state;

        // Announce while still holding the lock so subscribers see
        // transitions in the order they happened.
        if let Some(change) = next.change {
            self.announce(change, &inner);
        }
        next.permitted
    }

    fn announce(&self, change: StateChange, inner: &BreakerState) {
        tracing::warn!(
            breaker = %self.name,
            from = %change.from,
            to = %change.to,
            failure_rate = inner.window.failure_rate(),
            buffered_calls = inner.window.len(),
            "Circuit breaker state changed"
        );
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "name" => self.name.clone(),
            "from" => change.from.as_str(),
            "to" => change.to.as_str()
        )
        .increment(1);
        metrics::gauge!("circuit_breaker_state", "name" => self.name.clone())
            .set(f64::from(change.to.code()));

        // No subscribers is not an error.
        let _ = self.transitions.send(StateTransition {
            name: self.name.clone(),
            from: change.from,
            to: change.to,
            at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const FAST: Duration = Duration::from_millis(5);

    fn breaker(clock: &ManualClock) -> CircuitBreaker {
        CircuitBreaker::with_clock(
            "price-service",
            CircuitBreakerConfig::default(),
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = CircuitBreakerConfig::default().with_permitted_probe_calls(0);
        assert!(CircuitBreaker::new("x", config).is_err());
    }

    #[test]
    fn test_opens_after_failure_rate_reached() {
        let clock = ManualClock::new();
        let breaker = breaker(&clock);

        for _ in 0..3 {
            assert!(breaker.permit());
            breaker.record_failure(FAST);
        }
        for _ in 0..2 {
            assert!(breaker.permit());
            breaker.record_success(FAST);
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        let metrics = breaker.metrics();
        assert_eq!(metrics.buffered_calls, 5);
        assert_eq!(metrics.failed_calls, 3);
        assert_eq!(metrics.failure_rate, 60.0);
    }

    #[test]
    fn test_counts_refused_calls() {
        let clock = ManualClock::new();
        let breaker = breaker(&clock);
        for _ in 0..5 {
            breaker.record_failure(FAST);
        }

        assert!(!breaker.permit());
        assert!(!breaker.permit());
        assert_eq!(breaker.metrics().not_permitted_calls, 2);
    }

    #[tokio::test]
    async fn test_broadcasts_transitions_in_order() {
        let clock = ManualClock::new();
        let breaker = breaker(&clock);
        let mut rx = breaker.subscribe();

        for _ in 0..5 {
            breaker.record_failure(FAST);
        }
        clock.advance(Duration::from_secs(5));
        assert!(breaker.permit());
        breaker.reset();

        let first = rx.recv().await.unwrap();
        assert_eq!((first.from, first.to), (CircuitState::Closed, CircuitState::Open));
        assert_eq!(first.name, "price-service");
        let second = rx.recv().await.unwrap();
        assert_eq!(
            (second.from, second.to),
            (CircuitState::Open, CircuitState::HalfOpen)
        );
        let third = rx.recv().await.unwrap();
        assert_eq!(
            (third.from, third.to),
            (CircuitState::HalfOpen, CircuitState::Closed)
        );
    }

    #[test]
    fn test_reset_clears_metrics() {
        let clock = ManualClock::new();
        let breaker = breaker(&clock);
        for _ in 0..5 {
            breaker.record_failure(FAST);
        }
        breaker.permit();

        breaker.reset();

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.buffered_calls, 0);
        assert_eq!(metrics.not_permitted_calls, 0);
        assert_eq!(metrics.failure_rate, 0.0);
    }
}
