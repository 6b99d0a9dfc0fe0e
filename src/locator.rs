//! # Interval Locator
//!
//! Binary-search lookups over a timestamp-sorted slice of [`TideRecord`]s.
//!
//! [`locate`] finds the pair of extrema that bracket a query time. When the
//! query lands exactly on a record, that record is the pivot and is left out:
//! the pair is its two neighbours. So querying exactly at a high tide returns
//! the lows on either side of it, and querying exactly at the first or last
//! record yields an invalid interval.

use crate::TideRecord;
use serde::Serialize;

/// The two extrema bracketing a query time.
///
/// Either side may be missing at the ends of the data; the interval is only
/// usable for interpolation when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TideInterval {
    pub previous: Option<TideRecord>,
    pub next: Option<TideRecord>,
}

impl TideInterval {
    pub fn is_valid(&self) -> bool {
        self.previous.is_some() && self.next.is_some()
    }

    /// Both sides, if present.
    pub fn pair(&self) -> Option<(TideRecord, TideRecord)> {
        self.previous.zip(self.next)
    }

    /// Seconds between the bracketing extrema, or 0 for an invalid interval.
    pub fn duration_seconds(&self) -> i64 {
        self.pair()
            .map_or(0, |(previous, next)| next.timestamp - previous.timestamp)
    }
}

/// Find the records bracketing `t`. O(log n).
pub fn locate(records: &[TideRecord], t: i64) -> TideInterval {
    match records.binary_search_by_key(&t, |r| r.timestamp) {
        Ok(i) => TideInterval {
            previous: i.checked_sub(1).map(|p| records[p]),
            next: records.get(i + 1).copied(),
        },
        Err(i) => TideInterval {
            previous: i.checked_sub(1).map(|p| records[p]),
            next: records.get(i).copied(),
        },
    }
}

/// Records with `start <= timestamp <= end`, as a sub-slice. O(log n).
///
/// Empty when `end < start` or the range misses the data entirely.
pub fn in_range(records: &[TideRecord], start: i64, end: i64) -> &[TideRecord] {
    if end < start {
        return &[];
    }
    let lo = records.partition_point(|r| r.timestamp < start);
    let hi = records.partition_point(|r| r.timestamp <= end);
    &records[lo..hi]
}

/// First record strictly after `t`, if any. O(log n).
pub fn first_after(records: &[TideRecord], t: i64) -> Option<TideRecord> {
    let i = records.partition_point(|r| r.timestamp <= t);
    records.get(i).copied()
}
