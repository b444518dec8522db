use super::behavior::CircuitBreakerBehavior;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerMetrics {
    pub total_successes: u64,
    pub total_failures: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// A simple closed/open/half-open circuit breaker. Trips to `Open` after
/// `failure_threshold` consecutive failures; after `timeout` elapses it
/// allows a trial call (`HalfOpen`); `success_threshold` consecutive
/// successes there close it again.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitState>,
    opened_at: Mutex<Option<Instant>>,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitState::Closed),
            opened_at: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    fn transition_to_half_open_if_due(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CircuitState::Open {
            let opened_at = *self.opened_at.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(opened_at) = opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    *state = CircuitState::HalfOpen;
                }
            }
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.transition_to_half_open_if_due();
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn should_allow(&self) -> bool {
        matches!(self.state(), CircuitState::Closed | CircuitState::HalfOpen)
    }

    fn record_success(&self, _duration: Duration) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CircuitState::HalfOpen && successes >= self.config.success_threshold {
            *state = CircuitState::Closed;
            self.consecutive_successes.store(0, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, _duration: Duration) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        if failures >= self.config.failure_threshold {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state != CircuitState::Open {
                *state = CircuitState::Open;
                *self.opened_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    fn force_open(&self) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = CircuitState::Open;
        *self.opened_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
    }

    fn force_closed(&self) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = CircuitState::Closed;
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            consecutive_successes: self.consecutive_successes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trips_open_after_threshold_failures() {
        let cb = CircuitBreaker::new(
            "bus",
            CircuitBreakerConfig {
                failure_threshold: 3,
                success_threshold: 2,
                timeout: Duration::from_millis(50),
            },
        );
        assert!(cb.should_allow());
        for _ in 0..3 {
            cb.record_failure(Duration::from_millis(1));
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn half_opens_after_timeout_and_closes_on_success() {
        let cb = CircuitBreaker::new(
            "bus",
            CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                timeout: Duration::from_millis(10),
            },
        );
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
