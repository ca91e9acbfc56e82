//! Resilience primitives for calls to unreliable dependencies.
//!
//! - [`CircuitBreaker`] wraps the pure [`transition`] function with a clock,
//!   a mutex and transition notifications
//! - [`CircuitBreakerRegistry`] hands out one breaker per dependency name
//! - [`CallGateway`] runs a call under a breaker and a time limit, with a
//!   fallback value
//! - [`RetryExecutor`] retries failed operations with exponential backoff

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod retry;
pub mod state;
pub mod transition;
pub mod window;

pub use breaker::{CircuitBreaker, CircuitBreakerMetrics, StateTransition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CircuitBreakerConfig;
pub use error::{ConfigError, ConfigResult};
pub use gateway::{CallGateway, FallbackCause};
pub use registry::CircuitBreakerRegistry;
pub use retry::{RecordingSleeper, RetryError, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
pub use state::CircuitState;
pub use transition::{
    BreakerInput, BreakerState, CallOutcome, StateChange, Transitioned, transition,
};
