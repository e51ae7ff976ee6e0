//! # OSP3 Log Entry Decoder
//!
//! Parses one fixed-width log entry into a [`LogRecord`].

use super::protocol::*;
use crate::error::{Osp3Error, Result};

/// Return the 79-byte payload of an entry, ignoring anything after it
pub(crate) fn require_payload(entry: &[u8]) -> Result<&[u8]> {
    entry.get(..OSP3_LOG_PAYLOAD_SIZE).ok_or_else(|| {
        Osp3Error::MalformedRecord(format!(
            "entry too short: expected at least {} bytes, got {}",
            OSP3_LOG_PAYLOAD_SIZE,
            entry.len()
        ))
    })
}

fn field_bytes(payload: &[u8], field: Field) -> &[u8] {
    &payload[field.offset..field.end()]
}

fn invalid_field(payload: &[u8], field: Field) -> Osp3Error {
    Osp3Error::MalformedRecord(format!(
        "invalid {} at offset {}: {:?}",
        field.name,
        field.offset,
        String::from_utf8_lossy(field_bytes(payload, field))
    ))
}

/// Decode a fixed-width decimal field
pub(crate) fn decimal_field(payload: &[u8], field: Field) -> Result<u64> {
    let digits = field_bytes(payload, field);
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid_field(payload, field));
    }

    Ok(digits
        .iter()
        .fold(0u64, |acc, &d| acc * 10 + u64::from(d - b'0')))
}

/// Decode a two-digit hexadecimal field
pub(crate) fn hex_field(payload: &[u8], field: Field) -> Result<u8> {
    let digits = field_bytes(payload, field);
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid_field(payload, field));
    }

    // All ASCII hex digits, so the slice is valid UTF-8 and fits a u8 at width 2
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or_else(|| invalid_field(payload, field))
}

fn u32_field(payload: &[u8], field: Field) -> Result<u32> {
    // At most 5 digits for every u32 field
    u32::try_from(decimal_field(payload, field)?).map_err(|_| invalid_field(payload, field))
}

fn on_off_field(payload: &[u8], field: Field) -> Result<bool> {
    match field_bytes(payload, field) {
        b"0" => Ok(false),
        b"1" => Ok(true),
        _ => Err(invalid_field(payload, field)),
    }
}

fn check_separators(payload: &[u8]) -> Result<()> {
    // Every field but the last is followed by a comma
    for field in &OSP3_FIELDS[..OSP3_FIELDS.len() - 1] {
        let at = field.end();
        if payload[at] != OSP3_FIELD_SEPARATOR {
            return Err(Osp3Error::MalformedRecord(format!(
                "expected ',' after {} at offset {}, found {:?}",
                field.name, at, payload[at] as char
            )));
        }
    }
    Ok(())
}

fn decode_channel(
    payload: &[u8],
    [mv, ma, mw, onoff, intr]: [Field; 5],
) -> Result<ChannelSection> {
    Ok(ChannelSection {
        millivolts: u32_field(payload, mv)?,
        milliamps: u32_field(payload, ma)?,
        milliwatts: u32_field(payload, mw)?,
        enabled: on_off_field(payload, onoff)?,
        interrupts: Interrupts(hex_field(payload, intr)?),
    })
}

/// Decode a log entry
///
/// Checksums are decoded but not verified; see
/// [`verify_checksums`](super::checksum::verify_checksums).
///
/// # Arguments
///
/// * `entry` - Log entry bytes, at least 79 long; a trailing "\r\n" or
///   anything else after the payload is ignored
///
/// # Returns
///
/// * `Result<LogRecord>` - Decoded record, or error if malformed
///
/// # Errors
///
/// Returns `MalformedRecord` if:
/// - The entry is shorter than 79 bytes
/// - A separator is not a comma
/// - A decimal field holds a non-digit
/// - A hex field holds a non-hex character
/// - An on/off field is neither `0` nor `1`
///
/// # Examples
///
/// ```
/// use smartpower3::osp3::decoder::decode_log_entry;
///
/// let line = b"0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n";
/// let record = decode_log_entry(line).unwrap();
/// assert_eq!(record.timestamp_ms, 815169);
/// assert_eq!(record.input.millivolts, 15296);
/// ```
pub fn decode_log_entry(entry: &[u8]) -> Result<LogRecord> {
    let payload = require_payload(entry)?;
    check_separators(payload)?;

    Ok(LogRecord {
        timestamp_ms: decimal_field(payload, FIELD_TIMESTAMP)?,
        input: InputSection {
            millivolts: u32_field(payload, FIELD_MV_IN)?,
            milliamps: u32_field(payload, FIELD_MA_IN)?,
            milliwatts: u32_field(payload, FIELD_MW_IN)?,
            enabled: on_off_field(payload, FIELD_ONOFF_IN)?,
        },
        channel0: decode_channel(
            payload,
            [FIELD_MV_0, FIELD_MA_0, FIELD_MW_0, FIELD_ONOFF_0, FIELD_INTR_0],
        )?,
        channel1: decode_channel(
            payload,
            [FIELD_MV_1, FIELD_MA_1, FIELD_MW_1, FIELD_ONOFF_1, FIELD_INTR_1],
        )?,
        checksum: Checksums {
            additive: hex_field(payload, FIELD_CHECKSUM_2S)?,
            xor: hex_field(payload, FIELD_CHECKSUM_XOR)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osp3::checksum::verify_checksums;

    const LOG1: &[u8] =
        b"0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n";
    const LOG2: &[u8] =
        b"0343732187,15321,0072,01103,0,00000,0000,00000,0,00,00000,0000,00000,0,00,1c,12\r\n";
    const BUSY: &[u8] =
        b"0001234567,19874,1203,23908,1,05012,0840,04210,1,0A,12003,0021,00252,1,Ff,00,00\r\n";

    fn assert_malformed(entry: &[u8]) {
        match decode_log_entry(entry) {
            Err(Osp3Error::MalformedRecord(_)) => {}
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_wiki_example() {
        let record = decode_log_entry(LOG1).unwrap();
        assert_eq!(record.timestamp_ms, 815169);
        assert_eq!(record.input.millivolts, 15296);
        assert_eq!(record.input.milliamps, 36);
        assert_eq!(record.input.milliwatts, 550);
        assert!(!record.input.enabled);
        assert_eq!(record.channel0, ChannelSection::default());
        assert_eq!(record.channel1, ChannelSection::default());
        assert_eq!(record.checksum, Checksums { additive: 0x14, xor: 0x12 });
    }

    #[test]
    fn test_decode_hex_checksum_letters() {
        let record = decode_log_entry(LOG2).unwrap();
        assert_eq!(record.checksum.additive, 0x1c);
        assert_eq!(record.checksum.xor, 0x12);
    }

    #[test]
    fn test_decode_all_sections() {
        let record = decode_log_entry(BUSY).unwrap();
        assert_eq!(record.timestamp_ms, 1_234_567);
        assert!(record.input.enabled);

        assert_eq!(record.channel0.millivolts, 5012);
        assert_eq!(record.channel0.milliamps, 840);
        assert_eq!(record.channel0.milliwatts, 4210);
        assert!(record.channel0.enabled);
        assert_eq!(record.channel0.interrupts, Interrupts(0x0A));

        assert_eq!(record.channel1.millivolts, 12003);
        assert_eq!(record.channel1.milliwatts, 252);
        assert_eq!(record.channel1.interrupts.bits(), 0xFF);
    }

    #[test]
    fn test_decode_max_values() {
        let line = b"9999999999,99999,9999,99999,1,99999,9999,99999,1,ff,99999,9999,99999,1,ff,ff,ff";
        let record = decode_log_entry(line).unwrap();
        assert_eq!(record.timestamp_ms, 9_999_999_999);
        assert_eq!(record.input.millivolts, 99999);
        assert_eq!(record.channel1.milliamps, 9999);
    }

    #[test]
    fn test_decode_no_newline() {
        let payload = &LOG1[..OSP3_LOG_PAYLOAD_SIZE];
        assert_eq!(decode_log_entry(payload).unwrap(), decode_log_entry(LOG1).unwrap());
    }

    #[test]
    fn test_decode_ignores_trailing_garbage() {
        let mut line = LOG1[..OSP3_LOG_PAYLOAD_SIZE].to_vec();
        line.extend_from_slice(b"#garbage\n");
        assert_eq!(decode_log_entry(&line).unwrap().timestamp_ms, 815169);
    }

    #[test]
    fn test_decode_too_short() {
        assert_malformed(&LOG1[..78]);
        assert_malformed(b"");
    }

    #[test]
    fn test_decode_missing_field() {
        // Drop the input mA field: "0036," removed, then pad back to length
        let mut line = b"0000815169,15296,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12".to_vec();
        line.extend_from_slice(b"\r\n\r\n\r\n");
        assert!(line.len() >= OSP3_LOG_PAYLOAD_SIZE);
        assert_malformed(&line);
    }

    #[test]
    fn test_decode_wrong_separator() {
        let mut line = LOG1.to_vec();
        line[10] = b';';
        assert_malformed(&line);
    }

    #[test]
    fn test_decode_non_digit() {
        let mut line = LOG1.to_vec();
        line[3] = b'x';
        assert_malformed(&line);

        // Signs and spaces are not digits either
        let mut line = LOG1.to_vec();
        line[11] = b' ';
        assert_malformed(&line);
    }

    #[test]
    fn test_decode_bad_hex() {
        let mut line = LOG1.to_vec();
        line[FIELD_INTR_0.offset] = b'+';
        assert_malformed(&line);

        let mut line = LOG1.to_vec();
        line[FIELD_CHECKSUM_XOR.offset + 1] = b'z';
        assert_malformed(&line);
    }

    #[test]
    fn test_decode_on_off_out_of_range() {
        let mut line = LOG1.to_vec();
        line[FIELD_ONOFF_IN.offset] = b'2';
        assert_malformed(&line);
    }

    #[test]
    fn test_decode_independent_of_checksum() {
        let mut line = LOG1.to_vec();
        line[FIELD_CHECKSUM_2S.offset + 1] = b'5';
        let record = decode_log_entry(&line).unwrap();
        assert_eq!(record.checksum.additive, 0x15);
        assert!(!verify_checksums(&line).unwrap().is_match());
    }
}
