use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Tracks consecutive publish failures and blocks further attempts while the
// broker is unhealthy.
//
// States:
// - Closed:  requests pass through
// - Open:    requests rejected until the cooldown elapses
// - Probing: limited requests allowed to test recovery
//
// The caller asks `allow()` before the operation and reports the outcome
// with `on_success()` / `on_failure()`; no lock is held across the
// operation itself.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    Probing,
}

#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub trip_threshold: u32,
    /// How long the breaker stays open before probing.
    pub cooldown: Duration,
    /// Successful probes required to close again.
    pub probe_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_threshold: 5,
            cooldown: Duration::from_secs(30),
            probe_successes: 3,
        }
    }
}

struct Inner {
    state: BreakerState,
    failures: u32,
    probes: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                probes: 0,
                opened_at: None,
            }),
        }
    }

    /// Admission check. An open breaker transitions to probing once the
    /// cooldown has elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::Probing => true,
            BreakerState::Open => {
                let cooled = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled {
                    tracing::info!("circuit breaker probing after cooldown");
                    inner.state = BreakerState::Probing;
                    inner.probes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => inner.failures = 0,
            BreakerState::Probing => {
                inner.probes += 1;
                if inner.probes >= self.config.probe_successes {
                    tracing::info!(probes = inner.probes, "circuit breaker closed");
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.probes = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failures += 1;
        inner.opened_at = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                if inner.failures >= self.config.trip_threshold {
                    tracing::warn!(failures = inner.failures, "circuit breaker opened");
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::Probing => {
                tracing::warn!("probe failed, circuit breaker reopened");
                inner.state = BreakerState::Open;
                inner.probes = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
