//! # Tide Queries
//!
//! Point-in-time answers over a [`PortCache`]. Everything here is a pure read;
//! a missing answer is `None` or an empty slice, never an error, and callers
//! are expected to show a "no tide data" message rather than fail.

use crate::interpolate::{self, TideState};
use crate::locator::{self, TideInterval};
use crate::{PortCache, TideRecord};
use serde::Serialize;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// The next high or low tide after a query time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NextTide {
    pub is_high: bool,
    pub timestamp: i64,
    pub height: f32,
    pub seconds_until: i64,
}

impl NextTide {
    pub fn label(&self) -> &'static str {
        if self.is_high {
            "High Tide"
        } else {
            "Low Tide"
        }
    }
}

/// Bracketing pair at `t`, only when both sides exist.
pub fn interval_at(cache: &PortCache, t: i64) -> Option<(TideRecord, TideRecord)> {
    cache.interval_at(t).pair()
}

/// The first extremum strictly after `t`.
pub fn next_extremum(cache: &PortCache, t: i64) -> Option<NextTide> {
    let next = locator::first_after(cache.records(), t)?;
    Some(NextTide {
        is_high: next.is_high_tide,
        timestamp: next.timestamp,
        height: next.height,
        seconds_until: next.timestamp - t,
    })
}

/// Interpolated height and rate at `t`.
///
/// Always uses the tightest pair around `t`, and returns `None` outside the
/// data or when `t` sits exactly on the first or last record.
///
/// Exactly on an interior extremum the record itself is skipped and the
/// curve runs between its two neighbours, so at a high tide between two
/// equal lows the reported height is the low height with zero rate.
pub fn current_state(cache: &PortCache, t: i64) -> Option<TideState> {
    let TideInterval { previous, next } = cache.interval_at(t);
    interpolate::interpolate(&previous?, &next?, t)
}

pub fn records_in_range(cache: &PortCache, start: i64, end: i64) -> &[TideRecord] {
    cache.range(start, end)
}

pub fn is_fresh(cache: &PortCache, t: i64) -> bool {
    cache.is_valid_at(t)
}

/// Extrema from `t` through the next `days` days.
pub fn upcoming(cache: &PortCache, t: i64, days: u32) -> &[TideRecord] {
    let end = t.saturating_add(i64::from(days) * SECONDS_PER_DAY);
    cache.range(t, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PortCache {
        PortCache::build(
            "Auckland",
            vec![
                TideRecord::new(1000, 1.0, false),
                TideRecord::new(2000, 3.0, true),
                TideRecord::new(3000, 1.0, false),
                TideRecord::new(4000, 3.0, true),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_next_extremum_between_records() {
        let next = next_extremum(&cache(), 1500).unwrap();
        assert!(next.is_high);
        assert_eq!(next.timestamp, 2000);
        assert_eq!(next.height, 3.0);
        assert_eq!(next.seconds_until, 500);
        assert_eq!(next.label(), "High Tide");
    }

    #[test]
    fn test_next_extremum_before_and_after_data() {
        let cache = cache();
        assert_eq!(next_extremum(&cache, 500).unwrap().timestamp, 1000);
        assert_eq!(next_extremum(&cache, 2000).unwrap().timestamp, 3000);
        assert_eq!(next_extremum(&cache, 4000), None);
    }

    #[test]
    fn test_current_state_requires_valid_interval() {
        let cache = cache();
        assert!(current_state(&cache, 500).is_none());
        assert!(current_state(&cache, 1000).is_none());
        assert!(current_state(&cache, 4500).is_none());
        assert!(current_state(&cache, 2500).is_some());
    }

    #[test]
    fn test_current_state_on_interior_extremum_spans_neighbours() {
        let cache = cache();
        let at_high = current_state(&cache, 2000).unwrap();
        assert!((at_high.height - 1.0).abs() < 1e-9, "got {}", at_high.height);
        assert!(at_high.rate_per_hour.abs() < 1e-9);

        // One second either side still uses the high itself
        let before = current_state(&cache, 1999).unwrap();
        assert!(before.height > 2.9);
    }

    #[test]
    fn test_upcoming_days() {
        let cache = cache();
        assert_eq!(upcoming(&cache, 1500, 1).len(), 3);
        assert_eq!(upcoming(&cache, 1500, 0).len(), 0);
        assert_eq!(upcoming(&cache, i64::MAX - 10, 35).len(), 0);
    }
}
