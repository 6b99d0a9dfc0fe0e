//! # Tide Data File Codec
//!
//! Decodes the binary `.tdat` layout used for each port's pre-computed tide
//! table. Every file holds a few years of extrema for one station.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Station name, raw bytes terminated by '\n'           │
//! │  Last tide timestamp: i32 (4 bytes)                   │
//! │  Record count N: i32 (4 bytes)                        │
//! ├──────────────────────────────────────────────────────┤
//! │  N records, 5 bytes each:                             │
//! │  - Timestamp: i32 seconds since epoch (4 bytes)       │
//! │  - Height: i8 tenths of a meter (1 byte)              │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Integers are little-endian in the published data files. Big-endian files
//! can be read by setting [`Endianness::Big`].
//!
//! ## High/Low Assignment
//!
//! The file does not say which records are highs. Record 0 is high iff its
//! height exceeds record 1's; every later record takes the opposite type of
//! the one before it, so the decoded sequence always alternates.
//!
//! ## Truncation
//!
//! A stream that ends inside the record table is a partial read. By default
//! the records read so far are kept when there are at least two of them, and
//! the result is tagged [`Completeness::Partial`]. [`PartialPolicy::Reject`]
//! turns any partial read into [`DecodeError::PartialRead`].

use crate::error::{DecodeError, TideError};
use crate::source::ByteSource;
use crate::TideRecord;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Read, Write};
use tracing::{debug, warn};

/// Bytes per record: 4-byte timestamp plus 1-byte height.
pub const RECORD_SIZE: usize = 5;

/// Upper bound on the up-front allocation trusted from a header count.
const MAX_PREALLOCATED_RECORDS: usize = 1 << 16;

/// Byte order of the integers in a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// What to do when the stream ends inside the record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Keep what was read if it is at least two records.
    #[default]
    #[serde(rename = "accept")]
    AcceptIfSufficient,
    /// Fail with [`DecodeError::PartialRead`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub byte_order: Endianness,
    pub partial: PartialPolicy,
}

/// Whether every declared record was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Partial { expected: usize, decoded: usize },
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }
}

/// One port's decoded file.
#[derive(Debug, Clone)]
pub struct DecodedPort {
    /// Station name from the first line, decoded lossily
    pub station: String,
    /// Last tide timestamp as declared in the header
    pub last_timestamp: i64,
    /// Record count as declared in the header
    pub declared_count: usize,
    /// Records in file order with derived high/low flags
    pub records: Vec<TideRecord>,
    pub completeness: Completeness,
}

impl DecodedPort {
    pub fn into_records(self) -> Vec<TideRecord> {
        self.records
    }
}

/// Open `port` through `source` and decode it.
pub fn load(
    source: &dyn ByteSource,
    port: &str,
    options: &DecodeOptions,
) -> Result<DecodedPort, TideError> {
    let reader = source.open(port)?;
    let decoded = decode(reader, options)?;
    debug!(
        port,
        station = %decoded.station,
        records = decoded.records.len(),
        "decoded tide file"
    );
    Ok(decoded)
}

/// Decode a complete `.tdat` stream.
pub fn decode<R: Read>(reader: R, options: &DecodeOptions) -> Result<DecodedPort, DecodeError> {
    let mut reader = BufReader::new(reader);
    let order = options.byte_order;

    let station = read_station(&mut reader)?;
    let last_timestamp = read_header_i32(&mut reader, order)?;
    let declared = read_header_i32(&mut reader, order)?;
    let expected = usize::try_from(declared).unwrap_or(0);

    if expected < 2 {
        return Err(DecodeError::InsufficientRecords { found: expected });
    }

    let mut raw = Vec::with_capacity(expected.min(MAX_PREALLOCATED_RECORDS));
    for _ in 0..expected {
        match read_record(&mut reader, order)? {
            Some(pair) => raw.push(pair),
            None => break,
        }
    }

    let completeness = if raw.len() == expected {
        Completeness::Complete
    } else {
        let decoded = raw.len();
        if options.partial == PartialPolicy::Reject {
            return Err(DecodeError::PartialRead { expected, decoded });
        }
        if decoded < 2 {
            return Err(DecodeError::InsufficientRecords { found: decoded });
        }
        warn!(
            station = %station,
            expected,
            decoded,
            "tide file ended inside the record table, keeping partial data"
        );
        Completeness::Partial { expected, decoded }
    };

    Ok(DecodedPort {
        station,
        last_timestamp: i64::from(last_timestamp),
        declared_count: expected,
        records: with_tide_types(&raw),
        completeness,
    })
}

/// Write records in the `.tdat` layout.
///
/// Heights are rounded to tenths of a meter and clamped to the `i8` range.
/// Timestamps that do not fit in an `i32` are rejected.
pub fn encode<W: Write>(
    mut writer: W,
    station: &str,
    records: &[TideRecord],
    order: Endianness,
) -> io::Result<()> {
    writer.write_all(station.replace('\n', " ").as_bytes())?;
    writer.write_all(b"\n")?;

    let last = records.last().map_or(0, |r| r.timestamp);
    write_i32(&mut writer, wire_timestamp(last)?, order)?;

    let count = i32::try_from(records.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many records"))?;
    write_i32(&mut writer, count, order)?;

    for record in records {
        write_i32(&mut writer, wire_timestamp(record.timestamp)?, order)?;
        writer.write_i8(height_tenths(record.height))?;
    }
    writer.flush()
}

fn with_tide_types(raw: &[(i64, f32)]) -> Vec<TideRecord> {
    let mut records: Vec<TideRecord> = raw
        .iter()
        .map(|&(timestamp, height)| TideRecord::new(timestamp, height, false))
        .collect();
    assign_tide_types(&mut records);
    records
}

/// Record 0's type comes from comparing it with record 1; the rest alternate.
///
/// Runs over records in timestamp order, so callers that reorder or drop
/// records must run it again afterwards.
pub(crate) fn assign_tide_types(records: &mut [TideRecord]) {
    let first_is_high = match records {
        [first, second, ..] => first.height > second.height,
        _ => false,
    };

    for (i, record) in records.iter_mut().enumerate() {
        record.is_high_tide = first_is_high ^ (i % 2 == 1);
    }
}

fn read_station<R: BufRead>(reader: &mut R) -> Result<String, DecodeError> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.pop() != Some(b'\n') {
        return Err(DecodeError::TruncatedHeader);
    }
    Ok(String::from_utf8_lossy(&line).trim_end().to_string())
}

fn read_header_i32<R: Read>(reader: &mut R, order: Endianness) -> Result<i32, DecodeError> {
    read_i32(reader, order).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::TruncatedHeader,
        _ => DecodeError::Io(e),
    })
}

/// `Ok(None)` when the stream ends before a whole record is available.
fn read_record<R: Read>(
    reader: &mut R,
    order: Endianness,
) -> Result<Option<(i64, f32)>, DecodeError> {
    let mut buf = [0u8; RECORD_SIZE];
    match reader.read_exact(&mut buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(DecodeError::Io(e)),
    }

    let mut fields = &buf[..];
    let timestamp = read_i32(&mut fields, order)?;
    let tenths = fields.read_i8()?;
    Ok(Some((i64::from(timestamp), f32::from(tenths) / 10.0)))
}

fn read_i32<R: Read>(reader: &mut R, order: Endianness) -> io::Result<i32> {
    match order {
        Endianness::Little => reader.read_i32::<LittleEndian>(),
        Endianness::Big => reader.read_i32::<BigEndian>(),
    }
}

fn write_i32<W: Write>(writer: &mut W, value: i32, order: Endianness) -> io::Result<()> {
    match order {
        Endianness::Little => writer.write_i32::<LittleEndian>(value),
        Endianness::Big => writer.write_i32::<BigEndian>(value),
    }
}

fn wire_timestamp(timestamp: i64) -> io::Result<i32> {
    i32::try_from(timestamp).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("timestamp {timestamp} does not fit in 32 bits"),
        )
    })
}

fn height_tenths(height: f32) -> i8 {
    (height * 10.0)
        .round()
        .clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
}
