//! # Telemetry Module
//!
//! Writes accepted log entries to an output stream.
//!
//! This module handles:
//! - Passing device lines through unchanged
//! - Formatting records as JSONL (JSON Lines) with the host receive time
//! - Flushing after every entry so downstream pipes see data promptly

use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::osp3::protocol::LogRecord;

/// Destination for accepted log entries
pub trait RecordSink {
    /// Handle one accepted entry
    ///
    /// `record` is `None` when parsing was disabled.
    fn accept(&mut self, line: &[u8], record: Option<&LogRecord>) -> io::Result<()>;
}

/// Writes each device line exactly as received
#[derive(Debug)]
pub struct RawLineSink<W> {
    out: W,
}

impl<W: Write> RawLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for RawLineSink<W> {
    fn accept(&mut self, line: &[u8], _record: Option<&LogRecord>) -> io::Result<()> {
        self.out.write_all(line)?;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct JsonlEntry<'a> {
    host_time: String,
    #[serde(flatten)]
    record: &'a LogRecord,
}

/// Writes one JSON object per record
#[derive(Debug)]
pub struct JsonlSink<W> {
    out: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for JsonlSink<W> {
    fn accept(&mut self, _line: &[u8], record: Option<&LogRecord>) -> io::Result<()> {
        let record = record.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "jsonl output needs parsed records")
        })?;

        let entry = JsonlEntry {
            host_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record,
        };
        serde_json::to_writer(&mut self.out, &entry)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}
