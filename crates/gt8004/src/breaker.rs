// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Circuit breaker guarding the ingest endpoint.
//!
//! ```text
//!   Closed ──(threshold failures within window)──> Open
//!   Open ──(cooldown elapsed)──> HalfOpen
//!   HalfOpen ──(probe succeeds)──> Closed
//!   HalfOpen ──(probe fails, cooldown grows)──> Open
//! ```
//!
//! The transitions live in [`BreakerState::on_event`], a pure function of the
//! current state, the event, the time and the policy. [`CircuitBreaker`] wraps it
//! in a mutex so the flush task and the connectivity check see consistent state.
//!
//! Deliveries hold a [`Permit`] from [`CircuitBreaker::acquire`]. A permit
//! dropped before it is settled, for example when the delivery future is
//! cancelled by a timeout, hands the half-open probe slot back.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backoff::exponential;
use crate::clock::{deadline, Clock};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerPolicy {
    /// Consecutive failed deliveries that open the circuit.
    pub failure_threshold: u32,
    /// Failures further apart than this do not count as consecutive.
    pub failure_window: Duration,
    /// How long the circuit stays open the first time it trips.
    pub cooldown: Duration,
    /// Growth factor applied to the cooldown each time a half-open probe fails.
    pub cooldown_multiplier: f64,
    /// Upper bound for the grown cooldown.
    pub max_cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            cooldown_multiplier: 2.0,
            max_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl BreakerPolicy {
    fn cooldown_after(&self, reopens: u32) -> Duration {
        exponential(
            self.cooldown,
            self.cooldown_multiplier,
            reopens,
            self.max_cooldown.max(self.cooldown),
        )
    }
}

/// Coarse view of the breaker for callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed {
        failures: u32,
        last_failure: Option<Instant>,
    },
    Open {
        until: Instant,
        /// Times the circuit re-opened from half-open since it last closed.
        reopens: u32,
    },
    HalfOpen {
        probe_in_flight: bool,
        reopens: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    /// Time passed; lets an expired open circuit move to half-open.
    Tick,
    /// The single half-open probe was handed out.
    ProbeStarted,
    /// The probe ended without a verdict; the slot is free again.
    ProbeAbandoned,
    Success,
    Failure,
}

impl Default for BreakerState {
    fn default() -> Self {
        BreakerState::Closed {
            failures: 0,
            last_failure: None,
        }
    }
}

impl BreakerState {
    #[must_use]
    pub fn circuit(&self) -> CircuitState {
        match self {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { .. } => CircuitState::Open,
            BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    #[must_use]
    pub fn on_event(self, event: BreakerEvent, now: Instant, policy: &BreakerPolicy) -> Self {
        match (self, event) {
            (BreakerState::Open { until, reopens }, BreakerEvent::Tick) if now >= until => {
                BreakerState::HalfOpen {
                    probe_in_flight: false,
                    reopens,
                }
            }
            (
                BreakerState::HalfOpen {
                    probe_in_flight: false,
                    reopens,
                },
                BreakerEvent::ProbeStarted,
            ) => BreakerState::HalfOpen {
                probe_in_flight: true,
                reopens,
            },
            (
                BreakerState::HalfOpen {
                    probe_in_flight: true,
                    reopens,
                },
                BreakerEvent::ProbeAbandoned,
            ) => BreakerState::HalfOpen {
                probe_in_flight: false,
                reopens,
            },
            (_, BreakerEvent::Success) => BreakerState::default(),
            (
                BreakerState::Closed {
                    failures,
                    last_failure,
                },
                BreakerEvent::Failure,
            ) => {
                let within_window = last_failure
                    .is_some_and(|last| now.saturating_duration_since(last) <= policy.failure_window);
                let failures = if within_window {
                    failures.saturating_add(1)
                } else {
                    1
                };
                if failures >= policy.failure_threshold {
                    BreakerState::Open {
                        until: deadline(now, policy.cooldown),
                        reopens: 0,
                    }
                } else {
                    BreakerState::Closed {
                        failures,
                        last_failure: Some(now),
                    }
                }
            }
            (BreakerState::HalfOpen { reopens, .. }, BreakerEvent::Failure) => {
                let reopens = reopens.saturating_add(1);
                BreakerState::Open {
                    until: deadline(now, policy.cooldown_after(reopens)),
                    reopens,
                }
            }
            (state, _) => state,
        }
    }
}

/// Decision returned by [`CircuitBreaker::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; send normally.
    Allowed,
    /// Circuit half-open and this caller holds the only probe slot.
    Probe,
    /// Circuit open, or a probe is already in flight. Do not touch the network.
    Rejected,
}

/// One admitted delivery. Settle it with [`Permit::succeed`] or
/// [`Permit::fail`]; dropping it unsettled only releases a held probe slot.
#[derive(Debug)]
#[must_use]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this permit is the half-open probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Asks whether a delivery may reach the network right now.
    pub fn try_acquire(&self) -> Admission {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = *state;
        *state = state.on_event(BreakerEvent::Tick, now, &self.policy);
        if before.circuit() == CircuitState::Open && state.circuit() == CircuitState::HalfOpen {
            info!("Circuit half-open, allowing a single probe delivery");
        }

        match *state {
            BreakerState::Closed { .. } => Admission::Allowed,
            BreakerState::HalfOpen {
                probe_in_flight: false,
                ..
            } => {
                *state = state.on_event(BreakerEvent::ProbeStarted, now, &self.policy);
                Admission::Probe
            }
            BreakerState::Open { .. } | BreakerState::HalfOpen { .. } => Admission::Rejected,
        }
    }

    /// Like [`CircuitBreaker::try_acquire`], returning a [`Permit`] that
    /// settles the outcome. `None` means the delivery must not be attempted.
    pub fn acquire(&self) -> Option<Permit<'_>> {
        let probe = match self.try_acquire() {
            Admission::Rejected => return None,
            Admission::Allowed => false,
            Admission::Probe => true,
        };
        Some(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    fn release_probe(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = state.on_event(BreakerEvent::ProbeAbandoned, now, &self.policy);
        debug!("Probe delivery cancelled, releasing the half-open slot");
    }

    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.circuit() != CircuitState::Closed {
            info!("Circuit closed, ingest endpoint recovered");
        }
        *state = state.on_event(BreakerEvent::Success, now, &self.policy);
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = *state;
        *state = state.on_event(BreakerEvent::Failure, now, &self.policy);
        match (before, *state) {
            (BreakerState::Open { .. }, _) => {}
            (_, BreakerState::Open { until, reopens }) => {
                warn!(
                    cooldown_ms = until.saturating_duration_since(now).as_millis() as u64,
                    reopens, "Circuit opened, suspending deliveries"
                );
            }
            (_, BreakerState::Closed { failures, .. }) => {
                debug!(failures, "Recorded delivery failure");
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.snapshot().circuit()
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
