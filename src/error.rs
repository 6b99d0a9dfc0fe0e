//! Error and Result types for tide data loading and queries.
//!
//! Query-time "no answer" outcomes (no bracketing interval, data past its
//! horizon) are `None` or empty results, not errors. The only exception is
//! [`TideError::DataExpired`], which [`crate::PortCache::ensure_fresh`] returns
//! for callers that want to report the horizon explicitly.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, TideError>;

/// Errors raised while decoding one port's `.tdat` byte stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before the station name, last-tide timestamp and
    /// record count were all read.
    #[error("truncated header")]
    TruncatedHeader,

    /// Fewer than two usable extrema; interpolation needs a bracketing pair.
    #[error("insufficient records: found {found}, need at least 2")]
    InsufficientRecords {
        /// Number of records available
        found: usize,
    },

    /// The stream ended part way through the record table.
    #[error("partial read: decoded {decoded} of {expected} records")]
    PartialRead {
        /// Record count declared in the header
        expected: usize,
        /// Records decoded before the stream ended
        decoded: usize,
    },

    /// Underlying reader failed for a reason other than end of stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by the byte sources, caches and repository.
#[derive(Debug, Error)]
pub enum TideError {
    /// The port's bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// No byte source exists for the requested port.
    #[error("port not found: {0}")]
    PortNotFound(String),

    /// The query time lies beyond the last known extremum.
    #[error("tide data expired at {valid_until}, queried at {at}")]
    DataExpired {
        /// Timestamp of the last record
        valid_until: i64,
        /// Timestamp that was queried
        at: i64,
    },

    /// A pending load was discarded because the port was evicted.
    #[error("load for port {0} was superseded by eviction")]
    Evicted(String),

    /// The loader panicked before producing a cache.
    #[error("loader for port {0} panicked")]
    LoaderPanicked(String),

    /// Opening or enumerating a byte source failed.
    #[error("source I/O: {0}")]
    Io(#[from] io::Error),
}
