//! Breaker-guarded calls with a time limit and a fallback.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::breaker::CircuitBreaker;
use crate::registry::CircuitBreakerRegistry;

/// Why the fallback was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The breaker refused the call; the operation never ran.
    NotPermitted,
    /// The operation did not finish within the time limit.
    Timeout(Duration),
    /// The operation returned an error.
    Failed(String),
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackCause::NotPermitted => write!(f, "circuit open"),
            FallbackCause::Timeout(limit) => write!(f, "timed out after {limit:?}"),
            FallbackCause::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Runs outbound calls through the breaker registered for each dependency.
///
/// `call` always produces a value: either the operation's result or the
/// fallback's. Operation errors are recorded and logged, never returned.
#[derive(Clone)]
pub struct CallGateway {
    registry: Arc<CircuitBreakerRegistry>,
}

impl CallGateway {
    pub fn new(registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Calls `operation` under the named dependency's breaker and `timeout`.
    ///
    /// A timed-out operation future is dropped. Side effects it had already
    /// started are not rolled back. If the returned future itself is dropped
    /// after the breaker granted the call, the call is recorded as a failure
    /// so a HALF_OPEN probe slot is never leaked.
    pub async fn call<T, E, F, Fut, FB>(
        &self,
        dependency: &str,
        timeout: Duration,
        operation: F,
        fallback: FB,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        FB: FnOnce(FallbackCause) -> T,
    {
        let breaker = self.registry.get_or_create(dependency);

        if !breaker.permit() {
            tracing::debug!(dependency, "Call not permitted, using fallback");
            metrics::counter!("gateway_fallbacks_total", "dependency" => dependency.to_string(), "cause" => "not_permitted")
                .increment(1);
            return fallback(FallbackCause::NotPermitted);
        }

        let permitted = PermittedCall::start(breaker);
        let result = tokio::time::timeout(timeout, operation()).await;

        let cause = match result {
            Ok(Ok(value)) => {
                permitted.succeeded();
                return value;
            }
            Ok(Err(e)) => {
                permitted.failed();
                tracing::warn!(dependency, error = %e, "Call failed, using fallback");
                FallbackCause::Failed(e.to_string())
            }
            Err(_) => {
                permitted.failed();
                tracing::warn!(dependency, ?timeout, "Call timed out, using fallback");
                FallbackCause::Timeout(timeout)
            }
        };

        let label = match &cause {
            FallbackCause::Timeout(_) => "timeout",
            _ => "failed",
        };
        metrics::counter!("gateway_fallbacks_total", "dependency" => dependency.to_string(), "cause" => label)
            .increment(1);
        fallback(cause)
    }
}

/// A call the breaker let through whose outcome is still owed.
///
/// Dropped without an outcome, it records a failure.
struct PermittedCall {
    breaker: Arc<CircuitBreaker>,
    started: Instant,
    recorded: bool,
}

impl PermittedCall {
    fn start(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn succeeded(mut self) {
        self.recorded = true;
        self.breaker.record_success(self.started.elapsed());
    }

    fn failed(mut self) {
        self.recorded = true;
        self.breaker.record_failure(self.started.elapsed());
    }
}

impl Drop for PermittedCall {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::warn!(breaker = %self.breaker.name(), "Call abandoned before completion, recording failure");
            self.breaker.record_failure(self.started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CircuitBreakerConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gateway() -> CallGateway {
        CallGateway::new(Arc::new(
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_success_returns_value() {
        let gateway = gateway();
        let value = gateway
            .call(
                "svc",
                Duration::from_secs(1),
                || async { Ok::<_, String>(42) },
                |_| 0,
            )
            .await;
        assert_eq!(value, 42);
        assert_eq!(
            gateway.registry().get_or_create("svc").metrics().successful_calls,
            1
        );
    }

    #[tokio::test]
    async fn test_failure_uses_fallback_with_message() {
        let gateway = gateway();
        let cause = gateway
            .call(
                "svc",
                Duration::from_secs(1),
                || async { Err::<FallbackCause, _>("boom") },
                |cause| cause,
            )
            .await;
        assert_eq!(cause, FallbackCause::Failed("boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let gateway = gateway();
        let cause = gateway
            .call(
                "svc",
                Duration::from_secs(3),
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<_, String>(FallbackCause::NotPermitted)
                },
                |cause| cause,
            )
            .await;
        assert_eq!(cause, FallbackCause::Timeout(Duration::from_secs(3)));
        assert_eq!(
            gateway.registry().get_or_create("svc").metrics().failed_calls,
            1
        );
    }

    #[tokio::test]
    async fn test_always_failing_operation_opens_breaker() {
        let gateway = gateway();
        let runs = AtomicU32::new(0);

        for _ in 0..5 {
            let value = gateway
                .call(
                    "svc",
                    Duration::from_secs(1),
                    || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Err::<&str, _>("down")
                    },
                    |_| "fallback",
                )
                .await;
            assert_eq!(value, "fallback");
        }
        assert_eq!(
            gateway.registry().get_or_create("svc").state(),
            CircuitState::Open
        );

        let cause = gateway
            .call(
                "svc",
                Duration::from_secs(1),
                || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(FallbackCause::Failed(String::new()))
                },
                |cause| cause,
            )
            .await;
        assert_eq!(cause, FallbackCause::NotPermitted);
        assert_eq!(runs.load(Ordering::SeqCst), 5);
    }
}
