//! Circuit breaker configuration.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Circuit breaker configuration.
///
/// Rates are percentages in `(0, 100]`. A call counts as slow when it takes
/// at least `slow_call_duration`, whether it succeeded or not.
///
/// ```
/// use std::time::Duration;
/// use resilience::CircuitBreakerConfig;
///
/// let config = CircuitBreakerConfig::default()
///     .with_sliding_window_size(20)
///     .with_wait_duration_in_open(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept while CLOSED.
    pub sliding_window_size: usize,
    /// Outcomes required in the window before rates are evaluated.
    pub minimum_calls: usize,
    /// Failure rate that opens the breaker.
    pub failure_rate_threshold: f64,
    /// Duration at or above which a call is slow.
    pub slow_call_duration: Duration,
    /// Slow call rate that opens the breaker.
    pub slow_call_rate_threshold: f64,
    /// Time spent OPEN before probing.
    pub wait_duration_in_open: Duration,
    /// Probe calls allowed while HALF_OPEN.
    pub permitted_probe_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            slow_call_duration: Duration::from_secs(2),
            slow_call_rate_threshold: 100.0,
            wait_duration_in_open: Duration::from_secs(5),
            permitted_probe_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    pub fn with_minimum_calls(mut self, calls: usize) -> Self {
        self.minimum_calls = calls;
        self
    }

    pub fn with_failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    pub fn with_slow_call_duration(mut self, duration: Duration) -> Self {
        self.slow_call_duration = duration;
        self
    }

    pub fn with_slow_call_rate_threshold(mut self, percent: f64) -> Self {
        self.slow_call_rate_threshold = percent;
        self
    }

    pub fn with_wait_duration_in_open(mut self, wait: Duration) -> Self {
        self.wait_duration_in_open = wait;
        self
    }

    pub fn with_permitted_probe_calls(mut self, probes: u32) -> Self {
        self.permitted_probe_calls = probes;
        self
    }

    /// Outcomes needed before rates count. Never more than the window holds.
    pub fn effective_minimum_calls(&self) -> usize {
        self.minimum_calls.min(self.sliding_window_size)
    }

    /// Checks that the configuration can drive a breaker.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sliding_window_size == 0 {
            return Err(ConfigError::invalid(
                "sliding_window_size",
                "must be at least 1",
            ));
        }
        if self.minimum_calls == 0 {
            return Err(ConfigError::invalid("minimum_calls", "must be at least 1"));
        }
        if self.permitted_probe_calls == 0 {
            return Err(ConfigError::invalid(
                "permitted_probe_calls",
                "must be at least 1",
            ));
        }
        check_percent("failure_rate_threshold", self.failure_rate_threshold)?;
        check_percent("slow_call_rate_threshold", self.slow_call_rate_threshold)?;
        Ok(())
    }
}

fn check_percent(field: &'static str, value: f64) -> ConfigResult<()> {
    if !(value > 0.0 && value <= 100.0) {
        return Err(ConfigError::invalid(
            field,
            format!("must be in (0, 100], got {value}"),
        ));
    }
    Ok(())
}
