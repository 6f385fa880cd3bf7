//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - Half-Open: testing if downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold within window
//! Open → Half-Open: after open duration (observed lazily)
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails
//! ```
//!
//! # Design Decisions
//! - Per-target circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Limited trials in Half-Open (prevents hammering recovering downstream)
//! - Admission and outcome recording happen under one mutex; outcomes from a
//!   previous generation of the state machine are ignored

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Why a call was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("circuit is open")]
    Open,
    #[error("half-open trial limit reached")]
    TrialsExhausted,
}

#[derive(Debug, Clone)]
struct Policy {
    failure_threshold: u32,
    failure_window: Duration,
    open_duration: Duration,
    call_timeout: Duration,
    half_open_max_calls: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    last_transition: Instant,
    trials_in_flight: u32,
    generation: u64,
}

/// Failure-isolation state machine for one downstream target.
#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    policy: Policy,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let target = target.into();
        metrics::record_circuit_state(&target, CircuitState::Closed);
        Self {
            target,
            policy: Policy {
                failure_threshold: config.failure_threshold.max(1),
                failure_window: config.failure_window(),
                open_duration: config.open_duration(),
                call_timeout: config.call_timeout(),
                half_open_max_calls: config.half_open_max_calls.max(1),
            },
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                opened_at: None,
                last_transition: Instant::now(),
                trials_in_flight: 0,
                generation: 0,
            }),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Deadline applied to each admitted call.
    pub fn call_timeout(&self) -> Duration {
        self.policy.call_timeout
    }

    /// Current state, applying the Open → Half-Open timer if it has expired.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn last_transition(&self) -> Instant {
        self.lock().last_transition
    }

    /// Ask to perform one call.
    ///
    /// The returned permit must be settled with [`Permit::success`] or [`Permit::failure`];
    /// dropping it unsettled only gives back its half-open trial slot.
    pub fn try_acquire(&self) -> Result<Permit<'_>, Rejected> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => return Err(Rejected::Open),
            CircuitState::HalfOpen => {
                if inner.trials_in_flight >= self.policy.half_open_max_calls {
                    return Err(Rejected::TrialsExhausted);
                }
                inner.trials_in_flight += 1;
                true
            }
        };

        Ok(Permit {
            breaker: self,
            generation: inner.generation,
            trial,
            settled: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let expired = inner
            .opened_at
            .is_some_and(|opened| now.duration_since(opened) >= self.policy.open_duration);
        if expired {
            self.transition(inner, CircuitState::HalfOpen, now);
        }
    }

    fn on_success(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(circuit = %self.target, "Ignoring outcome from a previous circuit generation");
            return;
        }
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.last_failure = None;
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Closed, Instant::now()),
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(circuit = %self.target, "Ignoring outcome from a previous circuit generation");
            return;
        }
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => {
                let stale = inner
                    .last_failure
                    .is_some_and(|last| now.duration_since(last) > self.policy.failure_window);
                if stale {
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;
                inner.last_failure = Some(now);

                if inner.consecutive_failures >= self.policy.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open, now),
            CircuitState::Open => {}
        }
    }

    fn release(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        let from = inner.state;
        let failures = inner.consecutive_failures;

        inner.state = to;
        inner.generation += 1;
        inner.last_transition = now;
        inner.trials_in_flight = 0;
        match to {
            CircuitState::Open => inner.opened_at = Some(now),
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.last_failure = None;
                inner.opened_at = None;
            }
        }

        match to {
            CircuitState::Open => tracing::warn!(
                circuit = %self.target,
                from = ?from,
                failures,
                open_for = ?self.policy.open_duration,
                "Circuit opened"
            ),
            _ => tracing::info!(circuit = %self.target, from = ?from, to = ?to, "Circuit state changed"),
        }
        metrics::record_circuit_state(&self.target, to);
    }
}

/// Admission to perform one call through a [`CircuitBreaker`].
#[must_use = "a permit must be settled with success() or failure()"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// True when this call is a half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.generation);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.generation);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release(self.generation);
        }
    }
}

/// One breaker per downstream target, created on first use and shared afterwards.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get(&self, target: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(target, &self.config)))
            .clone()
    }

    /// Snapshot of every known target's state.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}
