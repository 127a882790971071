//! Escalating PIN lockout.
//!
//! Every function here is pure: callers pass the attempt snapshot and the
//! current time, and persist whatever the outcome requires.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use teller_config::LockoutConfig;

use super::credential::AttemptSnapshot;

/// True while a lock expiry is set and still in the future.
pub fn is_locked(snapshot: &AttemptSnapshot, now: DateTime<Utc>) -> bool {
    snapshot.locked_until.is_some_and(|until| now < until)
}

/// True when a freshness window is configured and the last attempt is older
/// than that window.
pub fn is_stale(
    snapshot: &AttemptSnapshot,
    now: DateTime<Utc>,
    freshness: Option<Duration>,
) -> bool {
    let (Some(window), Some(last_attempt)) =
        (freshness, snapshot.last_attempt_at)
    else {
        return false;
    };

    match TimeDelta::from_std(window)
        .ok()
        .and_then(|window| last_attempt.checked_add_signed(window))
    {
        Some(fresh_until) => now > fresh_until,
        None => false,
    }
}

/// Lock length for a failure count.
///
/// Zero below `threshold`. At and above it the base doubles per extra
/// failure: `min(base * 2^(attempts - threshold), cap)`. Overflow saturates
/// to `cap`.
pub fn lock_duration_for(
    attempts: u32,
    base: Duration,
    threshold: u32,
    cap: Duration,
) -> Duration {
    if attempts < threshold {
        return Duration::ZERO;
    }

    2u32.checked_pow(attempts - threshold)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(cap, |duration| duration.min(cap))
}

/// Time left on an active lock, rounded up to whole seconds so a client
/// honouring it never retries early.
pub fn remaining_lock(
    snapshot: &AttemptSnapshot,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let until = snapshot.locked_until?;
    let remaining = (until - now).to_std().ok()?;
    if remaining.is_zero() {
        return None;
    }
    Some(ceil_to_seconds(remaining))
}

pub(crate) fn ceil_to_seconds(duration: Duration) -> Duration {
    if duration.subsec_nanos() == 0 {
        duration
    } else {
        Duration::from_secs(duration.as_secs().saturating_add(1))
    }
}

/// Outcome of recording one more failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    Open { remaining_attempts: u32 },
    Locked { duration: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub base_duration: Duration,
    pub max_duration: Duration,
    pub pin_freshness: Option<Duration>,
}

impl LockoutPolicy {
    pub fn new(
        threshold: u32,
        base_duration: Duration,
        max_duration: Duration,
    ) -> Self {
        Self {
            threshold,
            base_duration,
            max_duration,
            pin_freshness: None,
        }
    }

    pub fn with_pin_freshness(mut self, window: Duration) -> Self {
        self.pin_freshness = Some(window);
        self
    }

    pub fn lock_duration(&self, attempts: u32) -> Duration {
        lock_duration_for(
            attempts,
            self.base_duration,
            self.threshold,
            self.max_duration,
        )
    }

    pub fn remaining_attempts(&self, attempts: u32) -> u32 {
        self.threshold.saturating_sub(attempts)
    }

    pub fn evaluate(&self, attempts: u32) -> LockDecision {
        let duration = self.lock_duration(attempts);
        if duration.is_zero() {
            LockDecision::Open {
                remaining_attempts: self.remaining_attempts(attempts),
            }
        } else {
            LockDecision::Locked { duration }
        }
    }

    pub fn is_stale(
        &self,
        snapshot: &AttemptSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        is_stale(snapshot, now, self.pin_freshness)
    }
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(config: &LockoutConfig) -> Self {
        Self {
            threshold: config.threshold,
            base_duration: config.base_duration,
            max_duration: config.max_duration,
            pin_freshness: config.pin_freshness,
        }
    }
}
