//! # OSP3 Log Entry Encoder
//!
//! Renders a [`LogRecord`] in the device's fixed-width layout. Used to build
//! reference entries for tests and to re-seal records with fresh checksums.

use std::fmt::Write as _;

use super::checksum::checksum8;
use super::protocol::*;
use crate::error::{Osp3Error, Result};

fn check_width(value: u64, field: Field) -> Result<u64> {
    // `field.width` is at most 10 digits, well within u64
    if value >= 10u64.pow(field.width as u32) {
        return Err(Osp3Error::MalformedRecord(format!(
            "{} value {} does not fit in {} digits",
            field.name, value, field.width
        )));
    }
    Ok(value)
}

fn push_decimal(out: &mut String, value: u64, field: Field) -> Result<()> {
    let value = check_width(value, field)?;
    // Writing to a String cannot fail
    let _ = write!(out, "{:0width$},", value, width = field.width);
    Ok(())
}

fn push_on_off(out: &mut String, enabled: bool) {
    out.push(if enabled { '1' } else { '0' });
    out.push(',');
}

fn push_hex(out: &mut String, value: u8) {
    let _ = write!(out, "{:02x}", value);
}

/// Render everything before the checksum fields, including the separator
/// that precedes them
fn encode_checksummed_span(record: &LogRecord) -> Result<String> {
    let mut out = String::with_capacity(OSP3_LOG_PROTOCOL_SIZE);

    push_decimal(&mut out, record.timestamp_ms, FIELD_TIMESTAMP)?;

    let input = &record.input;
    push_decimal(&mut out, input.millivolts.into(), FIELD_MV_IN)?;
    push_decimal(&mut out, input.milliamps.into(), FIELD_MA_IN)?;
    push_decimal(&mut out, input.milliwatts.into(), FIELD_MW_IN)?;
    push_on_off(&mut out, input.enabled);

    for (channel, [mv, ma, mw]) in [
        (&record.channel0, [FIELD_MV_0, FIELD_MA_0, FIELD_MW_0]),
        (&record.channel1, [FIELD_MV_1, FIELD_MA_1, FIELD_MW_1]),
    ] {
        push_decimal(&mut out, channel.millivolts.into(), mv)?;
        push_decimal(&mut out, channel.milliamps.into(), ma)?;
        push_decimal(&mut out, channel.milliwatts.into(), mw)?;
        push_on_off(&mut out, channel.enabled);
        push_hex(&mut out, channel.interrupts.bits());
        out.push(',');
    }

    debug_assert_eq!(out.len(), OSP3_CHECKSUM_SPAN);
    Ok(out)
}

/// Encode a record as a complete log entry, "\r\n" included
///
/// The record's own checksum values are written as-is.
///
/// # Errors
///
/// Returns `MalformedRecord` if a value is wider than its field.
///
/// # Examples
///
/// ```
/// use smartpower3::osp3::decoder::decode_log_entry;
/// use smartpower3::osp3::encoder::encode_log_entry;
///
/// let line = "0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n";
/// let record = decode_log_entry(line.as_bytes()).unwrap();
/// assert_eq!(encode_log_entry(&record).unwrap(), line);
/// ```
pub fn encode_log_entry(record: &LogRecord) -> Result<String> {
    let mut out = encode_checksummed_span(record)?;
    push_hex(&mut out, record.checksum.additive);
    out.push(',');
    push_hex(&mut out, record.checksum.xor);
    out.push_str("\r\n");
    Ok(out)
}

/// Return a copy of `record` carrying the checksums of its rendered fields
pub fn seal_log_record(record: &LogRecord) -> Result<LogRecord> {
    let span = encode_checksummed_span(record)?;
    Ok(LogRecord {
        checksum: checksum8(span.as_bytes()),
        ..*record
    })
}
