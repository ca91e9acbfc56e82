//! Application configuration loaded from environment variables.

use std::time::Duration;

use resilience::{CircuitBreakerConfig, RetryPolicy};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human output
/// - `DATABASE_URL`: PostgreSQL URL; in-memory stores when unset
/// - `PRICE_SERVICE_TIMEOUT_MS`: price lookup time limit (default `3000`)
/// - `IDEMPOTENCY_GUARD`: `true` to skip already processed message IDs
/// - `BREAKER_*` and `RETRY_*`: see [`Config::breaker_config`] and
///   [`Config::retry_policy`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub price_service_timeout: Duration,
    pub idempotency_guard: bool,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    ///
    /// Unparseable values fall back to the default for that key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parse(key).map(Duration::from_millis).unwrap_or(default)
        };
        let float = |key: &str, default: f64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(default)
        };

        let b = defaults.breaker;
        let breaker = CircuitBreakerConfig::default()
            .with_sliding_window_size(
                parse("BREAKER_SLIDING_WINDOW_SIZE").map_or(b.sliding_window_size, |v| v as usize),
            )
            .with_minimum_calls(parse("BREAKER_MINIMUM_CALLS").map_or(b.minimum_calls, |v| v as usize))
            .with_failure_rate_threshold(float(
                "BREAKER_FAILURE_RATE_THRESHOLD",
                b.failure_rate_threshold,
            ))
            .with_slow_call_duration(millis("BREAKER_SLOW_CALL_DURATION_MS", b.slow_call_duration))
            .with_slow_call_rate_threshold(float(
                "BREAKER_SLOW_CALL_RATE_THRESHOLD",
                b.slow_call_rate_threshold,
            ))
            .with_wait_duration_in_open(millis("BREAKER_WAIT_DURATION_MS", b.wait_duration_in_open))
            .with_permitted_probe_calls(
                parse("BREAKER_PERMITTED_PROBE_CALLS")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(b.permitted_probe_calls),
            );

        let r = defaults.retry;
        let retry = RetryPolicy::new(
            parse("RETRY_MAX_ATTEMPTS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(r.max_attempts),
            millis("RETRY_INITIAL_DELAY_MS", r.initial_delay),
        )
        .with_multiplier(float("RETRY_MULTIPLIER", r.multiplier))
        .with_max_delay(millis("RETRY_MAX_DELAY_MS", r.max_delay));

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            price_service_timeout: millis("PRICE_SERVICE_TIMEOUT_MS", defaults.price_service_timeout),
            idempotency_guard: lookup("IDEMPOTENCY_GUARD")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(defaults.idempotency_guard),
            breaker,
            retry,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Breaker settings shared by every dependency.
    ///
    /// `BREAKER_SLIDING_WINDOW_SIZE`, `BREAKER_MINIMUM_CALLS`,
    /// `BREAKER_FAILURE_RATE_THRESHOLD`, `BREAKER_SLOW_CALL_DURATION_MS`,
    /// `BREAKER_SLOW_CALL_RATE_THRESHOLD`, `BREAKER_WAIT_DURATION_MS`,
    /// `BREAKER_PERMITTED_PROBE_CALLS`.
    pub fn breaker_config(&self) -> &CircuitBreakerConfig {
        &self.breaker
    }

    /// Retry settings for confirmation emails.
    ///
    /// `RETRY_MAX_ATTEMPTS`, `RETRY_INITIAL_DELAY_MS`, `RETRY_MULTIPLIER`,
    /// `RETRY_MAX_DELAY_MS`.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            price_service_timeout: Duration::from_secs(3),
            idempotency_guard: false,
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}
