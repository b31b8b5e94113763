use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use shared_config::SchedulingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failing, reject requests
    HalfOpen, // Cooldown elapsed, next request probes
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
    pub is_open: bool,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

impl From<&SchedulingConfig> for CircuitBreakerConfig {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            recovery_timeout: config.cooldown,
        }
    }
}

/// Consecutive-failure breaker owned by a single availability session.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::default(),
            config,
        }
    }

    pub fn snapshot(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    pub fn state(&self, now: Instant) -> CircuitState {
        if !self.state.is_open {
            CircuitState::Closed
        } else if self.cooldown_elapsed(now) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn allow_request(&self, now: Instant) -> bool {
        match self.state(now) {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                info!("Circuit breaker half-open, allowing probe request");
                true
            }
            CircuitState::Open => false,
        }
    }

    pub fn record_success(&mut self) {
        if self.state.is_open {
            info!("Circuit breaker reset to CLOSED state");
        }
        self.state = CircuitBreakerState::default();
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.state.failure_count = self.state.failure_count.saturating_add(1);
        self.state.last_failure_time = Some(now);

        if self.state.failure_count >= self.config.failure_threshold && !self.state.is_open {
            self.state.is_open = true;
            warn!("Circuit breaker opened due to {} failures", self.state.failure_count);
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.state
            .last_failure_time
            .is_some_and(|last| now.saturating_duration_since(last) >= self.config.recovery_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_on_threshold_and_half_opens_after_cooldown() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let start = Instant::now();

        breaker.record_failure(start);
        breaker.record_failure(start);
        assert_eq!(breaker.state(start), CircuitState::Closed);

        breaker.record_failure(start);
        assert_eq!(breaker.state(start), CircuitState::Open);
        assert!(!breaker.allow_request(start + Duration::from_secs(29)));
        assert!(breaker.allow_request(start + Duration::from_secs(30)));
        assert_eq!(breaker.state(start + Duration::from_secs(30)), CircuitState::HalfOpen);
    }

    #[test]
    fn test_failed_probe_restarts_cooldown() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let start = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(start);
        }

        let probe = start + Duration::from_secs(31);
        breaker.record_failure(probe);

        assert_eq!(breaker.snapshot().failure_count, 4);
        assert!(!breaker.allow_request(probe + Duration::from_secs(10)));
        assert!(breaker.allow_request(probe + Duration::from_secs(30)));
    }

    #[test]
    fn test_success_resets_everything() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let start = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(start);
        }

        breaker.record_success();

        assert_eq!(breaker.snapshot(), &CircuitBreakerState::default());
        assert!(breaker.allow_request(start));
    }
}
