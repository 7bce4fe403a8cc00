//! Per-device health state machine.
//!
//! Degradations are confirmed before they are reported: a diverging
//! outcome must be observed `max_retries + 1` times in a row (with a
//! re-poll after each retry) before `current` moves. Recovery to
//! `Online` is trusted on first sight.

use tracing::{debug, info};

use holewatch_core::{Health, PollOutcome};

/// What `advance` decided for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Outcome agrees with the confirmed health.
    Unchanged,
    /// Diverging outcome not yet confirmed; re-poll after the retry delay.
    Retry { attempt: u32, candidate: Health },
    /// Health changed; report it.
    Confirmed { previous: Health, health: Health },
}

impl Advance {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Advance::Confirmed { .. })
    }
}

/// Mutable health record for one device.
#[derive(Debug, Clone)]
pub struct DeviceHealthState {
    /// Last confirmed (reported) health.
    current: Health,
    /// Consecutive diverging observations since the last agreement.
    retry_count: u32,
    /// A divergence has been seen but not yet confirmed.
    pending_confirmation: bool,
    max_retries: u32,
}

impl DeviceHealthState {
    /// A device is assumed online until shown otherwise.
    pub fn new(max_retries: u32) -> Self {
        Self::with_health(Health::Online, max_retries)
    }

    pub fn with_health(current: Health, max_retries: u32) -> Self {
        Self {
            current,
            retry_count: 0,
            pending_confirmation: false,
            max_retries,
        }
    }

    /// Apply one poll outcome.
    pub fn advance(&mut self, outcome: PollOutcome) -> Advance {
        let target = outcome.target_health();

        if target == self.current {
            if self.pending_confirmation {
                debug!(health = %self.current, retries = self.retry_count, "divergence did not persist");
            }
            self.reset_retries();
            return Advance::Unchanged;
        }

        if target == Health::Online || self.retry_count >= self.max_retries {
            let previous = self.current;
            self.current = target;
            self.reset_retries();
            info!(from = %previous, to = %target, "health transition confirmed");
            return Advance::Confirmed {
                previous,
                health: target,
            };
        }

        self.retry_count += 1;
        self.pending_confirmation = true;
        debug!(
            health = %self.current,
            candidate = %target,
            attempt = self.retry_count,
            max_retries = self.max_retries,
            "diverging outcome, awaiting confirmation"
        );
        Advance::Retry {
            attempt: self.retry_count,
            candidate: target,
        }
    }

    /// Drop any in-progress confirmation without touching `current`.
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.pending_confirmation = false;
    }

    pub fn current(&self) -> Health {
        self.current
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn pending_confirmation(&self) -> bool {
        self.pending_confirmation
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
