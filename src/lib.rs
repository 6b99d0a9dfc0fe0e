//! # NZ Tides Core Library
//!
//! This library is the tide data engine behind the `nz-tides` command. It turns
//! pre-computed tables of high and low tides into point-in-time answers: the
//! current height, how fast the tide is rising or falling, when the next high or
//! low tide is, and multi-day listings.
//!
//! ## Design Philosophy
//!
//! ### Immutable Snapshots
//! - **Decoded once**: Each port's `.tdat` file is decoded into a sorted array of
//!   [`TideRecord`]s and frozen inside a [`PortCache`]
//! - **Replaced, never edited**: Reloading a port builds a new cache and swaps it
//!   into the [`TideRepository`] slot in one step
//! - **Lock-light reads**: Queries clone an `Arc` out of the slot and then run
//!   without holding any lock
//!
//! ### Logarithmic Queries
//! Every lookup is a binary search over the frozen array:
//! - **Interval lookup**: the two extrema bracketing a timestamp, O(log n)
//! - **Range lookup**: O(log n) to find the bounds, O(k) to copy k records
//!
//! ### Data Flow
//! 1. **Source**: A [`ByteSource`] hands out the raw bytes for a port
//! 2. **Decode**: [`codec::decode`] parses the header and records, deriving high/low
//! 3. **Build**: [`PortCache::build`] sorts, validates and freezes the records
//! 4. **Publish**: [`TideRepository`] makes the cache visible to all callers
//! 5. **Query**: [`query`] combines interval lookup with the cosine model
//!
//! ## Core Types
//!
//! - [`TideRecord`]: A single predicted high or low tide
//! - [`PortCache`]: All records for one port plus its validity horizon
//! - [`TideRepository`]: Lazily-populated, thread-safe map of port caches

use serde::{Deserialize, Serialize};

// Module declarations
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod locator;
pub mod query;
pub mod render;
pub mod repository;
pub mod source;

#[cfg(test)]
mod tests;

pub use cache::PortCache;
pub use error::{DecodeError, Result, TideError};
pub use interpolate::TideState;
pub use locator::TideInterval;
pub use query::NextTide;
pub use repository::{LoadHandle, PortState, TideRepository};
pub use source::{ByteSource, DirSource, MemorySource};

/// A single predicted tide extremum.
///
/// Records are small `Copy` values:
/// - `i64` timestamp in seconds since the Unix epoch
/// - `f32` height in meters (the data files carry one decimal place)
/// - `bool` high/low flag, derived at decode time since files do not store it
///
/// Within a correctly loaded port, timestamps strictly increase and
/// `is_high_tide` alternates from one record to the next.
///
/// # Example
/// ```
/// use nztides_lib::TideRecord;
///
/// let low = TideRecord::new(1_700_000_000, 0.4, false);
/// let high = TideRecord::new(1_700_022_000, 2.9, true);
///
/// assert!(high.timestamp > low.timestamp);
/// assert!(high.height > low.height);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideRecord {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// Height in meters above chart datum
    pub height: f32,
    /// True for a high tide, false for a low tide
    pub is_high_tide: bool,
}

impl TideRecord {
    pub fn new(timestamp: i64, height: f32, is_high_tide: bool) -> Self {
        Self {
            timestamp,
            height,
            is_high_tide,
        }
    }

    /// Copy of this record with the high/low flag replaced.
    pub fn with_tide_type(self, is_high_tide: bool) -> Self {
        Self {
            is_high_tide,
            ..self
        }
    }
}
