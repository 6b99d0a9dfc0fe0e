//! Cross-module test suites.


use crate::codec::{encode, Endianness};
use crate::TideRecord;

/// Test helper: the four-record Auckland fixture as `.tdat` bytes
///
/// Low 1.0 m at 1000, high 3.0 m at 2000, low at 3000, high at 4000.
pub(crate) fn auckland_bytes() -> Vec<u8> {
    tdat_bytes(
        "Auckland",
        &[(1000, 1.0), (2000, 3.0), (3000, 1.0), (4000, 3.0)],
    )
}

/// Test helper: encode `(timestamp, height)` pairs; types are derived on decode
pub(crate) fn tdat_bytes(station: &str, pairs: &[(i64, f32)]) -> Vec<u8> {
    let records: Vec<TideRecord> = pairs
        .iter()
        .map(|&(ts, h)| TideRecord::new(ts, h, false))
        .collect();
    let mut bytes = Vec::new();
    encode(&mut bytes, station, &records, Endianness::Little).expect("fixture should encode");
    bytes
}

/// Test helper: a realistic semidiurnal table, ~6h12m between extrema
pub(crate) fn semidiurnal_pairs(start: i64, count: usize) -> Vec<(i64, f32)> {
    (0..count)
        .map(|i| {
            let ts = start + i as i64 * 22_350;
            let height = if i % 2 == 0 { 0.4 } else { 2.9 };
            (ts, height)
        })
        .collect()
}
