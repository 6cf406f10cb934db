//! # CSV Record Parsing
//!
//! Fixed-width numeric records: a sequence/flag field, an elapsed-time field
//! in milliseconds, then one reading per channel.

use crate::error::{DaqError, Result};

/// Bookkeeping fields preceding the channel readings
/// (field 0: sequence/flag, field 1: elapsed milliseconds)
pub const META_FIELDS: usize = 2;

/// Value field 0 carries when the device marks the start of a stream
pub const START_SENTINEL: &str = "1";

/// One parsed sample: exactly `META_FIELDS + channel count` numeric fields
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub fields: Vec<f64>,
}

impl SampleRecord {
    /// Per-record sequence/flag value (field 0)
    pub fn flag(&self) -> f64 {
        self.fields[0]
    }

    /// Elapsed time in milliseconds (field 1)
    pub fn time_ms(&self) -> f64 {
        self.fields[1]
    }

    /// Channel reading by zero-based channel index
    pub fn channel(&self, index: usize) -> f64 {
        self.fields[META_FIELDS + index]
    }
}

/// First comma-separated field of a raw line, used for the start sentinel
pub fn first_field(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
        .split(',')
        .next()
        .unwrap_or("")
}

/// Parse one raw line into a record with exactly `width` numeric fields.
///
/// # Errors
///
/// Returns `DaqError::MalformedRecord` on a wrong field count or a
/// non-numeric field.
pub fn parse_record(line: &str, width: usize) -> Result<SampleRecord> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut fields = Vec::with_capacity(width);
    for raw in trimmed.split(',') {
        let value = raw.trim().parse::<f64>().map_err(|_| {
            DaqError::MalformedRecord(format!("non-numeric field {:?} in {:?}", raw, trimmed))
        })?;
        fields.push(value);
    }
    if fields.len() != width {
        return Err(DaqError::MalformedRecord(format!(
            "expected {} fields, got {} in {:?}",
            width,
            fields.len(),
            trimmed
        )));
    }
    Ok(SampleRecord { fields })
}

/// Parse an accepted batch, stopping at the first malformed record.
///
/// Returns the parseable prefix together with the error that ended it, if
/// any. The caller decides whether the prefix is worth a best-effort write.
pub fn parse_batch(lines: &[String], width: usize) -> (Vec<SampleRecord>, Option<DaqError>) {
    let mut records = Vec::with_capacity(lines.len());
    for line in lines {
        match parse_record(line, width) {
            Ok(record) => records.push(record),
            Err(e) => return (records, Some(e)),
        }
    }
    (records, None)
}
