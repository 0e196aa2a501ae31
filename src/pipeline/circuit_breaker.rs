// src/pipeline/circuit_breaker.rs

//! Circuit Breaker pattern implementation.
//!
//! Stops a run once too many page fetches fail back to back, so an outage or
//! a block does not turn into an endless retry loop.

use crate::models::CrawlerConfig;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive page failures that open the breaker. Default: 3
    pub max_consecutive_failures: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
        }
    }
}

/// Consecutive-failure breaker for page fetches.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: usize,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Safe to keep fetching
    Closed { consecutive_failures: usize },
    /// Threshold reached, stop the run
    Open { consecutive_failures: usize },
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::with_config(CircuitBreakerConfig {
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        })
    }

    pub fn check(&self) -> CircuitBreakerResult {
        let consecutive_failures = self.consecutive_failures;
        if consecutive_failures >= self.config.max_consecutive_failures {
            CircuitBreakerResult::Open {
                consecutive_failures,
            }
        } else {
            CircuitBreakerResult::Closed {
                consecutive_failures,
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count a failure and report whether the breaker is now open.
    pub fn record_failure(&mut self) -> CircuitBreakerResult {
        self.consecutive_failures += 1;
        let result = self.check();
        if let CircuitBreakerResult::Open {
            consecutive_failures,
        } = result
        {
            log::error!(
                "Circuit breaker: OPEN after {} consecutive page failures",
                consecutive_failures
            );
        }
        result
    }

    pub fn is_open(&self) -> bool {
        matches!(self.check(), CircuitBreakerResult::Open { .. })
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let mut cb = CircuitBreaker::new();
        assert!(matches!(
            cb.record_failure(),
            CircuitBreakerResult::Closed { consecutive_failures: 1 }
        ));
        cb.record_failure();
        assert!(!cb.is_open());
        assert_eq!(
            cb.record_failure(),
            CircuitBreakerResult::Open { consecutive_failures: 3 }
        );
        assert!(cb.is_open());
    }

    #[test]
    fn test_success_resets() {
        let mut cb = CircuitBreaker::new();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn test_from_config_never_zero() {
        let config = CrawlerConfig {
            max_consecutive_failures: 0,
            ..CrawlerConfig::default()
        };
        let mut cb = CircuitBreaker::from_config(&config);
        assert!(!cb.is_open());
        assert!(matches!(
            cb.record_failure(),
            CircuitBreakerResult::Open { .. }
        ));
    }
}
