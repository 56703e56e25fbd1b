//! Circuit breaker guarding calls to the free movie catalog.
//!
//! After `failure_threshold` consecutive failures the breaker opens and every
//! call fails fast until `timeout` has elapsed; then one trial call is let
//! through (half-open). A successful trial closes the breaker again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through.
    Closed,
    /// Requests are rejected without touching the remote service.
    Open,
    /// One trial request is allowed.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            failure_threshold: failure_threshold.max(1),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        let current = self.state();
        match current {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure
                    .lock()
                    .map(|guard| guard.map(|at| at.elapsed()))
                    .unwrap_or(None);

                match elapsed {
                    Some(elapsed) if elapsed < self.timeout => false,
                    _ => {
                        self.set_state(CircuitState::HalfOpen);
                        info!("Circuit breaker transitioning to HalfOpen state");
                        true
                    }
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.state() == CircuitState::HalfOpen {
            self.set_state(CircuitState::Closed);
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = Some(Instant::now());
        }

        match self.state() {
            CircuitState::Closed if failures >= self.failure_threshold => {
                self.set_state(CircuitState::Open);
                error!(
                    "Circuit breaker OPENED - {} failures reached threshold {}",
                    failures, self.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                self.set_state(CircuitState::Open);
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
            .read()
            .map(|guard| *guard)
            .unwrap_or(CircuitState::Open)
    }

    fn set_state(&self, next: CircuitState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_trial_decides_next_state() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // zero timeout: the next call is the trial
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.can_execute());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
