//! Placement admission.
//!
//! DESIGN
//! ======
//! A single countdown per client: after a successful placement the next one
//! is refused until the cooldown elapses. Nothing else is gated; remote
//! events are never throttled.
//!
//! TRADE-OFFS
//! ==========
//! The gate lives only in the client. A modified client can place as fast
//! as it likes and no peer can tell.

#[cfg(test)]
#[path = "admission_test.rs"]
mod admission_test;

use std::time::{Duration, Instant};

use crate::consts::DEFAULT_COOLDOWN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("placement cooling down, {}ms remaining", remaining.as_millis())]
pub struct CoolingDown {
    pub remaining: Duration,
}

#[derive(Debug, Clone)]
pub struct Admission {
    cooldown: Duration,
    ready_at: Option<Instant>,
}

impl Default for Admission {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl Admission {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, ready_at: None }
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Time left before the next placement is admitted. Zero when ready.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.ready_at
            .map_or(Duration::ZERO, |ready| ready.saturating_duration_since(now))
    }

    /// Refuse while the countdown is running.
    ///
    /// # Errors
    ///
    /// Returns [`CoolingDown`] with the time left.
    pub fn check_at(&self, now: Instant) -> Result<(), CoolingDown> {
        let remaining = self.remaining_at(now);
        if remaining.is_zero() {
            Ok(())
        } else {
            Err(CoolingDown { remaining })
        }
    }

    /// Arm the countdown after a successful placement.
    pub fn start_at(&mut self, now: Instant) {
        self.ready_at = Some(now + self.cooldown);
    }

    /// Re-arm from a placement made `elapsed` ago, e.g. by an earlier process
    /// of the same client. Never shortens a countdown already running.
    pub fn resume_at(&mut self, elapsed: Duration, now: Instant) {
        let ready = now + self.cooldown.saturating_sub(elapsed);
        if self.ready_at.is_none_or(|current| current < ready) {
            self.ready_at = Some(ready);
        }
    }

    /// Remaining time rounded up to whole seconds, for display.
    #[must_use]
    pub fn remaining_secs_at(&self, now: Instant) -> u64 {
        let remaining = self.remaining_at(now);
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 { secs + 1 } else { secs }
    }
}
