//! Circuit breaker guarding a single upstream service.
//!
//! Every reference adapter owns one breaker. After a run of consecutive
//! failures the circuit opens and the adapter fails fast instead of
//! hammering a service that is blocking it. After a cooldown one probe
//! request is let through.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are refused until the cooldown expires.
    Open,
    /// Cooldown elapsed; one probe request is allowed.
    HalfOpen,
}

#[derive(Debug)]
struct Health {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Thread-safe breaker for one service.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    health: Mutex<Health>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(failure_threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown: Duration::from_secs(cooldown_secs),
            health: Mutex::new(Health {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Record a successful request: the circuit closes and the failure
    /// count resets.
    pub fn record_success(&self) {
        if let Ok(mut health) = self.health.lock() {
            health.state = CircuitState::Closed;
            health.consecutive_failures = 0;
        }
    }

    /// Record a failed request, opening the circuit at the threshold.
    pub fn record_failure(&self) {
        if let Ok(mut health) = self.health.lock() {
            health.consecutive_failures = health.consecutive_failures.saturating_add(1);
            health.last_failure_at = Some(Instant::now());
            if health.consecutive_failures >= self.failure_threshold {
                health.state = CircuitState::Open;
            }
        }
    }

    /// Whether a request should be attempted now.
    ///
    /// An open circuit whose cooldown has elapsed moves to
    /// [`CircuitState::HalfOpen`] and allows the attempt.
    pub fn should_attempt(&self) -> bool {
        let Ok(mut health) = self.health.lock() else {
            return true;
        };
        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = health
                    .last_failure_at
                    .map_or(true, |t| t.elapsed() >= self.cooldown);
                if cooled {
                    health.state = CircuitState::HalfOpen;
                }
                cooled
            }
        }
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.health
            .lock()
            .map_or(CircuitState::Closed, |h| h.state)
    }
}
