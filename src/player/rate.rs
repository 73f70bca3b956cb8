//! Playback rate acceleration: the curve and its sampling schedule.
//!
//! The player's defining behavior lives here. `compute_rate` maps a
//! progress fraction through a configurable exponent curve to a target
//! playback rate, and `RateSampler` decides when the session should
//! re-sample progress and apply a fresh rate to the audio engine.

use std::time::{Duration, Instant};

/// Tunable parameters of the acceleration curve.
///
/// Invariants: `start_rate <= max_rate`, `acceleration > 0`, all
/// finite. The session enforces these at the update boundary;
/// `compute_rate` refuses to produce a value when they do not hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConfig {
    pub start_rate: f64,
    pub max_rate: f64,
    /// Curve exponent. 1.0 is linear; below 1.0 accelerates early,
    /// above 1.0 accelerates late.
    pub acceleration: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            start_rate: 1.0,
            max_rate: 2.0,
            acceleration: 0.5,
        }
    }
}

impl RateConfig {
    /// Whether every invariant holds.
    pub fn is_valid(&self) -> bool {
        self.start_rate.is_finite()
            && self.max_rate.is_finite()
            && self.acceleration.is_finite()
            && self.start_rate > 0.0
            && self.acceleration > 0.0
            && self.start_rate <= self.max_rate
    }
}

/// Map a progress fraction to a target playback rate.
///
/// Returns `None` when `progress` is not finite (duration unknown or
/// zero at sampling time) or the config is invalid; the caller treats
/// that as a silent no-op tick and leaves the current rate alone.
pub fn compute_rate(progress: f64, config: &RateConfig) -> Option<f64> {
    if !progress.is_finite() || !config.is_valid() {
        return None;
    }

    let range = config.max_rate - config.start_rate;
    let curve = progress.powf(1.0 / config.acceleration);
    let raw = config.start_rate + range * curve;

    // powf can stray outside [0,1] for progress outside the unit
    // interval; the clamp also makes progress == 1.0 yield max_rate
    // exactly regardless of the exponent.
    Some(raw.max(config.start_rate).min(config.max_rate))
}

/// Cancellable periodic schedule for rate sampling.
///
/// A single `Option<Instant>` holds the next due time, so at most one
/// schedule can exist: `start` overwrites any prior one and `stop`
/// clears it. The session owns the sampler and calls `poll` from the
/// event loop; there is no timer thread to leak.
#[derive(Debug)]
pub struct RateSampler {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RateSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Begin (or restart) the schedule. Idempotent: any previously
    /// scheduled tick is discarded.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    /// Cancel the schedule. No tick fires until `start` is called again.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Fire at most one tick. Returns true when a tick is due and
    /// reschedules the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}
