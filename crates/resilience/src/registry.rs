//! Named circuit breakers, created on first use.

use std::sync::Arc;

use dashmap::DashMap;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;
use crate::error::ConfigResult;

/// Holds one breaker per dependency name for the life of the process.
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Creates a registry whose breakers use `default_config` unless
    /// registered otherwise.
    pub fn new(default_config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(default_config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        default_config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        default_config.validate()?;
        Ok(Self {
            default_config,
            clock,
            breakers: DashMap::new(),
        })
    }

    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    /// Returns the breaker for `name`, creating it with the default config.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::build(
                    name.to_string(),
                    self.default_config.clone(),
                    self.clock.clone(),
                ))
            })
            .clone()
    }

    /// Registers a breaker with its own config.
    ///
    /// If a breaker with this name already exists it is returned unchanged.
    pub fn register(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> ConfigResult<Arc<CircuitBreaker>> {
        config.validate()?;
        Ok(self
            .breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::build(
                    name.to_string(),
                    config,
                    self.clock.clone(),
                ))
            })
            .clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.clone())
    }

    /// Returns every breaker, sorted by name.
    pub fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        let mut breakers: Vec<_> = self.breakers.iter().map(|b| b.value().clone()).collect();
        breakers.sort_by(|a, b| a.name().cmp(b.name()));
        breakers
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self {
            default_config: CircuitBreakerConfig::default(),
            clock: Arc::new(SystemClock),
            breakers: DashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("price-service");
        let b = registry.get_or_create("price-service");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_register_keeps_existing_breaker() {
        let registry = CircuitBreakerRegistry::default();
        let custom = CircuitBreakerConfig::default().with_wait_duration_in_open(Duration::from_secs(1));

        let first = registry.register("mail", custom.clone()).unwrap();
        assert_eq!(first.config(), &custom);

        let second = registry
            .register("mail", CircuitBreakerConfig::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_register_validates() {
        let registry = CircuitBreakerRegistry::default();
        let bad = CircuitBreakerConfig::default().with_minimum_calls(0);
        assert!(registry.register("mail", bad).is_err());
        assert!(registry.get("mail").is_none());
    }

    #[test]
    fn test_all_is_sorted() {
        let registry = CircuitBreakerRegistry::default();
        registry.get_or_create("b");
        registry.get_or_create("a");
        let names: Vec<_> = registry.all().iter().map(|b| b.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
