//! # Error Types
//!
//! Custom error types for SmartPower3 using `thiserror`.

use thiserror::Error;

/// Main error type for SmartPower3
#[derive(Debug, Error)]
pub enum Osp3Error {
    /// No data arrived from the device before the read deadline
    #[error("read timed out after {transferred} bytes")]
    Timeout { transferred: usize },

    /// The underlying transport failed
    #[error("transport error after {transferred} bytes: {source}")]
    Transport {
        transferred: usize,
        #[source]
        source: std::io::Error,
    },

    /// Destination cannot hold one complete line
    #[error("line does not fit in {capacity} byte buffer")]
    BufferTooSmall { capacity: usize, transferred: usize },

    /// Text did not match the fixed log entry layout
    #[error("malformed log entry: {0}")]
    MalformedRecord(String),

    /// Serial port errors (open/configure)
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Osp3Error {
    /// Bytes written into the caller's destination before a read failed.
    ///
    /// Those bytes sit in `dest[..transferred]` and are never rolled back.
    /// Errors that do not come from a read report 0.
    pub fn transferred(&self) -> usize {
        match self {
            Osp3Error::Timeout { transferred }
            | Osp3Error::Transport { transferred, .. }
            | Osp3Error::BufferTooSmall { transferred, .. } => *transferred,
            _ => 0,
        }
    }

    /// True for a read deadline expiring, which callers may retry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Osp3Error::Timeout { .. })
    }
}

/// Result type alias for SmartPower3
pub type Result<T> = std::result::Result<T, Osp3Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transferred_reported_for_read_errors() {
        assert_eq!(Osp3Error::Timeout { transferred: 12 }.transferred(), 12);
        assert_eq!(
            Osp3Error::BufferTooSmall { capacity: 80, transferred: 80 }.transferred(),
            80
        );
        let err = Osp3Error::Transport {
            transferred: 3,
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
        };
        assert_eq!(err.transferred(), 3);
    }

    #[test]
    fn test_transferred_zero_for_other_errors() {
        assert_eq!(Osp3Error::MalformedRecord("x".into()).transferred(), 0);
        assert_eq!(Osp3Error::Serial("x".into()).transferred(), 0);
    }

    #[test]
    fn test_is_timeout() {
        assert!(Osp3Error::Timeout { transferred: 0 }.is_timeout());
        assert!(!Osp3Error::MalformedRecord("x".into()).is_timeout());
    }

    #[test]
    fn test_display_messages() {
        let err = Osp3Error::BufferTooSmall { capacity: 80, transferred: 80 };
        assert_eq!(err.to_string(), "line does not fit in 80 byte buffer");

        let err = Osp3Error::MalformedRecord("missing separator at offset 10".into());
        assert!(err.to_string().contains("offset 10"));
    }
}
