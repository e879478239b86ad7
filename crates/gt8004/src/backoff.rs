// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Retry delay computation.
//!
//! Delays are a pure function of the attempt number and the policy so they can
//! be tested without timers. Randomness only enters through the jitter sample,
//! which callers pass in explicitly.

use std::time::Duration;

/// Retry policy for a single batch delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Factor applied per additional retry. Must be >= 1.
    pub multiplier: f64,
    /// Maximum random offset added to or subtracted from each delay.
    pub jitter: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Total send attempts per batch, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0 for the first retry), without jitter.
    #[must_use]
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        exponential(self.base_delay, self.multiplier, retry, self.max_delay)
    }

    /// Delay before retry number `retry` given a jitter sample in `[-1.0, 1.0]`.
    ///
    /// The result stays within `jitter` of [`RetryPolicy::nominal_delay`] and never
    /// exceeds `max_delay`.
    #[must_use]
    pub fn delay_with_jitter(&self, retry: u32, sample: f64) -> Duration {
        let nominal = self.nominal_delay(retry).as_secs_f64();
        let sample = if sample.is_finite() {
            sample.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let offset = self.jitter.as_secs_f64() * sample;
        let jittered = (nominal + offset).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(jittered).unwrap_or(self.max_delay)
    }

    /// Jittered delay before retry number `retry`.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        self.delay_with_jitter(retry, fastrand::f64() * 2.0 - 1.0)
    }
}

/// `base * factor^exponent`, capped at `cap`.
#[must_use]
pub fn exponential(base: Duration, factor: f64, exponent: u32, cap: Duration) -> Duration {
    // powi takes an i32; anything past a few dozen doublings is already at the cap.
    let exponent = exponent.min(64) as i32;
    let secs = base.as_secs_f64() * factor.powi(exponent);
    if !secs.is_finite() {
        return cap;
    }
    let capped = secs.min(cap.as_secs_f64()).max(0.0);
    Duration::try_from_secs_f64(capped).unwrap_or(cap)
}
