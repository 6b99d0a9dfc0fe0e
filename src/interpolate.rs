//! # Cosine Tide Interpolation
//!
//! Between two consecutive extrema the tide is modelled as half a cosine
//! cycle, following the NZ Nautical Almanac convention:
//!
//! ```text
//! ω         = π / (t_next − t_prev)
//! amplitude = (h_prev − h_next) / 2
//! mean      = (h_prev + h_next) / 2
//! height(t) = amplitude · cos(ω · (t − t_prev)) + mean
//! rate(t)   = −amplitude · ω · sin(ω · (t − t_prev)) · 3600
//! ```
//!
//! This is a two-point approximation, not a harmonic model. It is only
//! accurate near the bracketing pair, so callers should always interpolate
//! from the tightest pair around the query time.

use crate::TideRecord;
use serde::Serialize;
use std::f64::consts::PI;

/// Seconds per hour; converts the per-second rate to per-hour.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Instantaneous tide state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TideState {
    /// Height in meters
    pub height: f64,
    /// Rate of change in meters per hour; positive while rising
    pub rate_per_hour: f64,
}

impl TideState {
    pub fn is_rising(&self) -> bool {
        self.rate_per_hour > 0.0
    }
}

/// Height and rate at `t` from a bracketing pair.
///
/// Returns `None` unless `next` is strictly after `previous`.
pub fn interpolate(previous: &TideRecord, next: &TideRecord, t: i64) -> Option<TideState> {
    let span = next.timestamp - previous.timestamp;
    if span <= 0 {
        return None;
    }

    let omega = PI / span as f64;
    let amplitude = (f64::from(previous.height) - f64::from(next.height)) / 2.0;
    let mean = (f64::from(previous.height) + f64::from(next.height)) / 2.0;
    let phase = omega * (t - previous.timestamp) as f64;

    Some(TideState {
        height: amplitude * phase.cos() + mean,
        rate_per_hour: -amplitude * omega * phase.sin() * SECONDS_PER_HOUR,
    })
}
