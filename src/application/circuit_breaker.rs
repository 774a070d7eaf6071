//! Circuit breaker isolating failing routers.
//!
//! A router that returns an error or panics is treated as not having vetoed
//! the record, so delivery continues. Repeated failures open the breaker and
//! the router is bypassed until the recovery timeout elapses; the next call is
//! then let through as a half-open probe.

use crate::application::ports::Clock;
use crate::infrastructure::raw::INTERNAL_TARGET;
use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of a router call made through a breaker.
#[derive(Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The router answered.
    Answered(T),
    /// The breaker is open and the router was not called.
    Bypassed,
    /// The router returned an error or panicked.
    Failed(String),
}

impl<T> Guarded<T> {
    /// The router's answer, if it gave one.
    pub fn answer(self) -> Option<T> {
        match self {
            Guarded::Answered(value) => Some(value),
            Guarded::Bypassed | Guarded::Failed(_) => None,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {}", text)
    } else {
        "panicked".to_string()
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Router is called normally
    Closed = 0,
    /// Router is bypassed
    Open = 1,
    /// One probe call is allowed through
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait before probing the router again
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker guarding one router slot.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    last_failure_millis: AtomicI64,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(CircuitBreakerConfig::default(), clock)
    }

    pub fn with_config(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            last_failure_millis: AtomicI64::new(0),
            config,
            clock,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Call a router unless the breaker is open, recording the outcome.
    ///
    /// Panics inside `call` are caught and count as failures.
    pub fn call<T, E, F>(&self, call: F) -> Guarded<T>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.allow_request() {
            return Guarded::Bypassed;
        }
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(value)) => {
                self.record_success();
                Guarded::Answered(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Guarded::Failed(e.to_string())
            }
            Err(payload) => {
                self.record_failure();
                Guarded::Failed(panic_message(payload.as_ref()))
            }
        }
    }

    /// Whether the router should be called.
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self.clock.now().timestamp_millis()
                    - self.last_failure_millis.load(Ordering::Acquire);
                let timeout = i64::try_from(self.config.recovery_timeout.as_millis())
                    .unwrap_or(i64::MAX);
                if elapsed < timeout {
                    return false;
                }
                // Only one caller moves Open -> HalfOpen.
                self.state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                    || self.state() == CircuitState::HalfOpen
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                self.consecutive_failures.store(0, Ordering::Release);
                self.state
                    .store(CircuitState::Closed as u8, Ordering::Release);
                debug!(target: INTERNAL_TARGET, "router recovered, circuit closed");
            }
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::Release);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        self.last_failure_millis
            .store(self.clock.now().timestamp_millis(), Ordering::Release);

        let reopen = match self.state() {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => failures >= u64::from(self.config.failure_threshold),
            CircuitState::Open => false,
        };
        if reopen {
            self.state
                .store(CircuitState::Open as u8, Ordering::Release);
            debug!(
                target: INTERNAL_TARGET,
                failures,
                timeout_secs = self.config.recovery_timeout.as_secs(),
                "router bypassed, circuit opened"
            );
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
    }
}
