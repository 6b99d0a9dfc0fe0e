//! # Port Cache
//!
//! An immutable, timestamp-sorted array of one port's tide records, plus the
//! metadata queries need. A cache is built once from a decoded file and never
//! modified; reloading a port produces a new cache.

use crate::codec::{self, Completeness, DecodedPort};
use crate::error::{DecodeError, Result, TideError};
use crate::locator::{self, TideInterval};
use crate::TideRecord;
use std::mem;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PortCache {
    port: String,
    station: String,
    records: Box<[TideRecord]>,
    valid_until: i64,
    file_valid_until: i64,
    completeness: Completeness,
}

impl PortCache {
    /// Sort, validate and freeze a port's records.
    ///
    /// The sort is stable. Records sharing a timestamp keep only the first.
    /// High/low flags are then re-derived over the final order, so they
    /// alternate whatever the input order was. Fails with [`DecodeError::InsufficientRecords`] if fewer than two
    /// records remain.
    pub fn build(port: &str, mut records: Vec<TideRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.timestamp);

        let before = records.len();
        records.dedup_by_key(|r| r.timestamp);
        if records.len() != before {
            warn!(
                port,
                dropped = before - records.len(),
                "dropped tide records with duplicate timestamps"
            );
        }

        codec::assign_tide_types(&mut records);

        let valid_until = match records.as_slice() {
            [_, .., last] => last.timestamp,
            _ => {
                return Err(TideError::Decode(DecodeError::InsufficientRecords {
                    found: records.len(),
                }))
            }
        };

        debug!(port, records = records.len(), valid_until, "built port cache");

        Ok(Self {
            port: port.to_string(),
            station: port.to_string(),
            records: records.into_boxed_slice(),
            valid_until,
            file_valid_until: valid_until,
            completeness: Completeness::Complete,
        })
    }

    /// Build from a decoded file, keeping its station name and header data.
    pub fn from_decoded(port: &str, decoded: DecodedPort) -> Result<Self> {
        let DecodedPort {
            station,
            last_timestamp,
            records,
            completeness,
            ..
        } = decoded;

        let mut cache = Self::build(port, records)?;
        if !station.is_empty() {
            cache.station = station;
        }
        cache.file_valid_until = last_timestamp;
        cache.completeness = completeness;
        Ok(cache)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Station name from the data file, or the port name if it had none.
    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn records(&self) -> &[TideRecord] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn first_timestamp(&self) -> i64 {
        self.records[0].timestamp
    }

    /// Timestamp of the last record; queries after it have no answer.
    pub fn valid_until(&self) -> i64 {
        self.valid_until
    }

    /// Last-tide timestamp declared in the file header.
    pub fn file_valid_until(&self) -> i64 {
        self.file_valid_until
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn is_valid_at(&self, t: i64) -> bool {
        t <= self.valid_until
    }

    /// Like [`is_valid_at`](Self::is_valid_at), but reports the horizon.
    pub fn ensure_fresh(&self, t: i64) -> Result<()> {
        if self.is_valid_at(t) {
            Ok(())
        } else {
            Err(TideError::DataExpired {
                valid_until: self.valid_until,
                at: t,
            })
        }
    }

    pub fn interval_at(&self, t: i64) -> TideInterval {
        locator::locate(&self.records, t)
    }

    pub fn range(&self, start: i64, end: i64) -> &[TideRecord] {
        locator::in_range(&self.records, start, end)
    }

    pub fn estimated_memory_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self.records.len() * mem::size_of::<TideRecord>()
            + self.port.len()
            + self.station.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shuffled() -> Vec<TideRecord> {
        vec![
            TideRecord::new(3000, 1.0, false),
            TideRecord::new(1000, 1.0, false),
            TideRecord::new(4000, 3.0, true),
            TideRecord::new(2000, 3.0, true),
        ]
    }

    #[test]
    fn test_build_sorts_and_sets_horizon() {
        let cache = PortCache::build("Auckland", shuffled()).unwrap();
        let timestamps: Vec<i64> = cache.records().iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![1000, 2000, 3000, 4000]);
        assert_eq!(cache.valid_until(), 4000);
        assert_eq!(cache.first_timestamp(), 1000);
        assert_eq!(cache.record_count(), 4);
        assert_eq!(cache.port(), "Auckland");
    }

    #[test]
    fn test_build_requires_two_records() {
        let err = PortCache::build("Raglan", vec![TideRecord::new(1000, 1.0, false)]).unwrap_err();
        assert!(matches!(
            err,
            TideError::Decode(DecodeError::InsufficientRecords { found: 1 })
        ));
        assert!(PortCache::build("Raglan", Vec::new()).is_err());
    }

    #[test]
    fn test_build_drops_duplicate_timestamps() {
        let mut records = shuffled();
        records.push(TideRecord::new(2000, 9.9, true));
        let cache = PortCache::build("Auckland", records).unwrap();
        assert_eq!(cache.record_count(), 4);
        assert_eq!(cache.records()[1].height, 3.0);
    }

    fn assert_alternates(cache: &PortCache) {
        for window in cache.records().windows(2) {
            assert_ne!(
                window[0].is_high_tide, window[1].is_high_tide,
                "Tide types should alternate at {}",
                window[1].timestamp
            );
        }
    }

    #[test]
    fn test_build_rederives_types_after_sorting() {
        // Flags as they would come out of a file read in this order
        let records = vec![
            TideRecord::new(2000, 3.0, true),
            TideRecord::new(1000, 1.0, false),
            TideRecord::new(3000, 1.0, true),
            TideRecord::new(4000, 3.0, false),
        ];
        let cache = PortCache::build("Auckland", records).unwrap();

        let types: Vec<bool> = cache.records().iter().map(|r| r.is_high_tide).collect();
        assert_eq!(types, vec![false, true, false, true]);
        assert_alternates(&cache);
    }

    #[test]
    fn test_build_rederives_types_after_dropping_duplicates() {
        let records = vec![
            TideRecord::new(1000, 1.0, false),
            TideRecord::new(2000, 3.0, true),
            TideRecord::new(2000, 1.0, false),
            TideRecord::new(3000, 3.0, true),
            TideRecord::new(4000, 1.0, false),
        ];
        let cache = PortCache::build("Auckland", records).unwrap();

        assert_eq!(cache.record_count(), 4);
        assert_alternates(&cache);
        assert!(!cache.records()[0].is_high_tide);
        assert!(cache.records()[3].is_high_tide);
    }

    #[test]
    fn test_freshness_boundary() {
        let cache = PortCache::build("Auckland", shuffled()).unwrap();
        assert!(cache.is_valid_at(4000));
        assert!(!cache.is_valid_at(4001));
        assert!(cache.ensure_fresh(4000).is_ok());
        assert!(matches!(
            cache.ensure_fresh(4001),
            Err(TideError::DataExpired {
                valid_until: 4000,
                at: 4001
            })
        ));
    }

    #[test]
    fn test_from_decoded_keeps_header_data() {
        let decoded = DecodedPort {
            station: "Port Taranaki".to_string(),
            last_timestamp: 5000,
            declared_count: 5,
            records: shuffled(),
            completeness: Completeness::Partial {
                expected: 5,
                decoded: 4,
            },
        };
        let cache = PortCache::from_decoded("Taranaki", decoded).unwrap();
        assert_eq!(cache.station(), "Port Taranaki");
        assert_eq!(cache.file_valid_until(), 5000);
        assert_eq!(cache.valid_until(), 4000);
        assert!(!cache.completeness().is_complete());
    }
}
