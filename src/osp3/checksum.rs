//! # CheckSum8 Implementation
//!
//! The two checksums carried by every OSP3 log entry, both computed over the
//! bytes preceding the two's complement checksum field.
//!
//! **CheckSum8 2s Complement**: wrapping 8-bit sum, then negated
//! **CheckSum8 Xor**: running 8-bit XOR

use super::decoder::{hex_field, require_payload};
use super::protocol::*;
use crate::error::Result;

/// Result of comparing recomputed checksums with claimed ones
///
/// A mismatch is an expected outcome on a noisy link, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Match,
    Mismatch {
        /// Recomputed from the payload
        computed: Checksums,
        /// Carried by (or supplied for) the entry
        claimed: Checksums,
    },
}

impl ChecksumOutcome {
    fn compare(computed: Checksums, claimed: Checksums) -> Self {
        if computed == claimed {
            ChecksumOutcome::Match
        } else {
            ChecksumOutcome::Mismatch { computed, claimed }
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, ChecksumOutcome::Match)
    }
}

/// Calculate both checksums over raw bytes
///
/// # Arguments
///
/// * `data` - Bytes to checksum (normally the first `OSP3_CHECKSUM_SPAN` bytes of an entry)
pub fn checksum8(data: &[u8]) -> Checksums {
    let (sum, xor) = data
        .iter()
        .fold((0u8, 0u8), |(sum, xor), &byte| (sum.wrapping_add(byte), xor ^ byte));

    Checksums {
        additive: sum.wrapping_neg(),
        xor,
    }
}

/// Compute the expected checksums for a log entry
///
/// # Arguments
///
/// * `entry` - Log entry bytes, at least `OSP3_LOG_PAYLOAD_SIZE` long (terminator optional)
///
/// # Errors
///
/// Returns `MalformedRecord` if the entry is shorter than one payload.
///
/// # Examples
///
/// ```
/// use smartpower3::osp3::checksum::compute_checksums;
///
/// let line = b"0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n";
/// let cs = compute_checksums(line).unwrap();
/// assert_eq!((cs.additive, cs.xor), (0x14, 0x12));
/// ```
pub fn compute_checksums(entry: &[u8]) -> Result<Checksums> {
    let payload = require_payload(entry)?;
    Ok(checksum8(&payload[..OSP3_CHECKSUM_SPAN]))
}

/// Verify a log entry against the checksums embedded in it
///
/// # Errors
///
/// Returns `MalformedRecord` if the entry is too short or an embedded
/// checksum is not two hex digits. A wrong checksum is reported as
/// `ChecksumOutcome::Mismatch`.
pub fn verify_checksums(entry: &[u8]) -> Result<ChecksumOutcome> {
    let payload = require_payload(entry)?;
    let claimed = Checksums {
        additive: hex_field(payload, FIELD_CHECKSUM_2S)?,
        xor: hex_field(payload, FIELD_CHECKSUM_XOR)?,
    };
    checksum_test(payload, claimed)
}

/// Verify a log entry against explicitly supplied checksums
///
/// The checksum text embedded in the entry is ignored.
pub fn checksum_test(entry: &[u8], claimed: Checksums) -> Result<ChecksumOutcome> {
    let computed = compute_checksums(entry)?;
    Ok(ChecksumOutcome::compare(computed, claimed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Osp3Error;

    // From the device wiki
    const LOG1: &[u8] =
        b"0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n";
    // Captured from a device
    const LOG2: &[u8] =
        b"0343732187,15321,0072,01103,0,00000,0000,00000,0,00,00000,0000,00000,0,00,1c,12\r\n";
    const LOG3: &[u8] =
        b"0343732197,15332,0084,01287,0,00000,0000,00000,0,00,00000,0000,00000,0,00,09,17\r\n";
    const LOG4: &[u8] =
        b"0343732207,15328,0055,00843,0,00000,0000,00000,0,00,00000,0000,00000,0,00,11,19\r\n";
    const LOG1_NO_NEWLINE: &[u8] =
        b"0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12";

    fn cs(additive: u8, xor: u8) -> Checksums {
        Checksums { additive, xor }
    }

    #[test]
    fn test_checksum8_empty() {
        assert_eq!(checksum8(&[]), cs(0, 0));
    }

    #[test]
    fn test_checksum8_wraps() {
        // 0x80 + 0x80 wraps to 0x00, negation of 0 is 0
        assert_eq!(checksum8(&[0x80, 0x80]), cs(0x00, 0x00));
        // 0x01 negates to 0xFF
        assert_eq!(checksum8(&[0x01]), cs(0xFF, 0x01));
    }

    #[test]
    fn test_compute_known_vectors() {
        assert_eq!(compute_checksums(LOG1).unwrap(), cs(0x14, 0x12));
        assert_eq!(compute_checksums(LOG2).unwrap(), cs(0x1c, 0x12));
        assert_eq!(compute_checksums(LOG3).unwrap(), cs(0x09, 0x17));
        assert_eq!(compute_checksums(LOG4).unwrap(), cs(0x11, 0x19));
    }

    #[test]
    fn test_verify_known_vectors() {
        for log in [LOG1, LOG2, LOG3, LOG4] {
            assert!(verify_checksums(log).unwrap().is_match());
        }
    }

    #[test]
    fn test_verify_bad_additive_digit() {
        let mut log = LOG1.to_vec();
        log[75] = b'5'; // "14" -> "15"
        match verify_checksums(&log).unwrap() {
            ChecksumOutcome::Mismatch { computed, claimed } => {
                assert_eq!(computed, cs(0x14, 0x12));
                assert_eq!(claimed, cs(0x15, 0x12));
            }
            other => panic!("Expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_bad_xor_digit() {
        let mut log = LOG1.to_vec();
        log[78] = b'3'; // "12" -> "13"
        assert!(!verify_checksums(&log).unwrap().is_match());
    }

    #[test]
    fn test_verify_detects_corrupted_field() {
        let mut log = LOG1.to_vec();
        log[15] = b'7'; // input mV 15296 -> 15297
        assert!(!verify_checksums(&log).unwrap().is_match());
    }

    #[test]
    fn test_checksum_test_explicit_values() {
        assert!(checksum_test(LOG1, cs(0x14, 0x12)).unwrap().is_match());
        assert!(checksum_test(LOG2, cs(0x1c, 0x12)).unwrap().is_match());
        assert!(!checksum_test(LOG1, cs(0x15, 0x12)).unwrap().is_match());
        assert!(!checksum_test(LOG1, cs(0x14, 0x13)).unwrap().is_match());
    }

    #[test]
    fn test_no_newline() {
        assert_eq!(LOG1_NO_NEWLINE.len(), OSP3_LOG_PAYLOAD_SIZE);
        assert_eq!(compute_checksums(LOG1_NO_NEWLINE).unwrap(), cs(0x14, 0x12));
        assert!(verify_checksums(LOG1_NO_NEWLINE).unwrap().is_match());
        assert!(checksum_test(LOG1_NO_NEWLINE, cs(0x14, 0x12)).unwrap().is_match());
    }

    #[test]
    fn test_too_short_is_error() {
        let short = &LOG1[..OSP3_LOG_PAYLOAD_SIZE - 1];
        assert!(matches!(compute_checksums(short), Err(Osp3Error::MalformedRecord(_))));
        assert!(matches!(verify_checksums(short), Err(Osp3Error::MalformedRecord(_))));
        assert!(checksum_test(short, cs(0x14, 0x12)).is_err());
    }

    #[test]
    fn test_unreadable_embedded_checksum_is_error() {
        let mut log = LOG1.to_vec();
        log[77] = b'g';
        assert!(matches!(verify_checksums(&log), Err(Osp3Error::MalformedRecord(_))));
    }
}
