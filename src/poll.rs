//! # Poll Loop
//!
//! Reads log entries until cancelled, dropping lines that fail validation.
//!
//! Validation happens in three steps, each optional after the first:
//!
//! 1. **Length** - anything other than an 81-byte line is dropped
//! 2. **Parse** - the fixed layout must decode
//! 3. **Checksum** - both embedded checksums must match
//!
//! A dropped line never affects the next one. Cancellation is cooperative:
//! the flag is checked between reads, so a read already waiting on the
//! device finishes (or times out) first.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Osp3Error, Result};
use crate::osp3::checksum::{verify_checksums, ChecksumOutcome};
use crate::osp3::decoder::decode_log_entry;
use crate::osp3::protocol::{Checksums, LogRecord, OSP3_LOG_PROTOCOL_SIZE, OSP3_MAX_PACKET_SIZE};
use crate::serial::{BufferedLineReader, PacketSource};
use crate::telemetry::RecordSink;

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Stop after this many accepted entries
    pub count: Option<u64>,
    pub verify_parse: bool,
    pub verify_checksum: bool,
    pub line_capacity: usize,
    /// Per-read timeout, `None` to wait without a deadline
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PollOptions {
    fn from(config: &Config) -> Self {
        Self {
            count: config.poll.count,
            verify_parse: config.poll.verify_parse,
            verify_checksum: config.poll.verify_checksum,
            line_capacity: config.poll.line_capacity,
            timeout: config.serial.timeout(),
        }
    }
}

/// Counters kept while polling
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub accepted: u64,
    pub short_lines: u64,
    pub long_lines: u64,
    pub parse_failures: u64,
    pub checksum_failures: u64,
}

impl PollStats {
    pub fn dropped(&self) -> u64 {
        self.short_lines + self.long_lines + self.parse_failures + self.checksum_failures
    }
}

/// Outcome of validating one line
#[derive(Debug)]
pub enum LineVerdict {
    /// Passed every enabled check; carries the record when parsing ran
    Accepted(Option<LogRecord>),
    TooShort,
    TooLong,
    Malformed(Osp3Error),
    ChecksumMismatch(Checksums),
}

/// Validate one complete line (terminator included)
pub fn classify_line(line: &[u8], verify_parse: bool, verify_checksum: bool) -> LineVerdict {
    if line.len() < OSP3_LOG_PROTOCOL_SIZE {
        return LineVerdict::TooShort;
    }
    if line.len() > OSP3_LOG_PROTOCOL_SIZE {
        return LineVerdict::TooLong;
    }

    let record = if verify_parse {
        match decode_log_entry(line) {
            Ok(record) => Some(record),
            Err(e) => return LineVerdict::Malformed(e),
        }
    } else {
        None
    };

    if verify_checksum {
        match verify_checksums(line) {
            Ok(ChecksumOutcome::Match) => {}
            Ok(ChecksumOutcome::Mismatch { computed, .. }) => {
                return LineVerdict::ChecksumMismatch(computed)
            }
            Err(e) => return LineVerdict::Malformed(e),
        }
    }

    LineVerdict::Accepted(record)
}

/// Drives a [`BufferedLineReader`] until cancelled or a count is reached
#[derive(Debug)]
pub struct Poller<S> {
    reader: BufferedLineReader<S>,
    options: PollOptions,
    stats: PollStats,
}

impl<S: PacketSource> Poller<S> {
    pub fn new(reader: BufferedLineReader<S>, options: PollOptions) -> Self {
        Self {
            reader,
            options,
            stats: PollStats::default(),
        }
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn reader_mut(&mut self) -> &mut BufferedLineReader<S> {
        &mut self.reader
    }

    pub fn into_reader(self) -> BufferedLineReader<S> {
        self.reader
    }

    fn count_reached(&self) -> bool {
        self.options
            .count
            .is_some_and(|limit| self.stats.accepted >= limit)
    }

    /// Read and validate log entries, handing accepted ones to `sink`
    ///
    /// Returns when `running` is cleared, when the configured count is
    /// reached, or on the first read error. A read error seen after
    /// `running` was cleared ends the poll cleanly.
    ///
    /// # Errors
    ///
    /// * `Timeout` / `Transport` - the device stopped answering
    /// * `Io` - the sink failed
    pub fn run(&mut self, running: &AtomicBool, sink: &mut dyn RecordSink) -> Result<PollStats> {
        let mut line = vec![0u8; self.options.line_capacity];

        while running.load(Ordering::SeqCst) && !self.count_reached() {
            let len = match self.reader.read_line(&mut line, self.options.timeout) {
                Ok(len) => len,
                Err(e) if !running.load(Ordering::SeqCst) => {
                    debug!("Read interrupted by shutdown: {}", e);
                    break;
                }
                Err(Osp3Error::BufferTooSmall { capacity, .. }) => {
                    warn!("Dropping line longer than {} bytes", capacity);
                    self.stats.long_lines += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let line = &line[..len];
            match classify_line(line, self.options.verify_parse, self.options.verify_checksum) {
                LineVerdict::Accepted(record) => {
                    sink.accept(line, record.as_ref())?;
                    self.stats.accepted += 1;
                    if let Some(record) = record {
                        for (name, channel) in [("0", &record.channel0), ("1", &record.channel1)] {
                            if !channel.interrupts.is_empty() {
                                debug!(
                                    "Channel {} interrupts: {}",
                                    name,
                                    channel.interrupts.names().collect::<Vec<_>>().join(", ")
                                );
                            }
                        }
                    }
                }
                LineVerdict::TooShort => {
                    warn!("Dropping shorter line than expected: {}", String::from_utf8_lossy(line).trim_end());
                    self.stats.short_lines += 1;
                }
                LineVerdict::TooLong => {
                    warn!("Dropping longer line than expected: {}", String::from_utf8_lossy(line).trim_end());
                    self.stats.long_lines += 1;
                }
                LineVerdict::Malformed(e) => {
                    warn!("Log entry parsing failed ({}): {}", e, String::from_utf8_lossy(line).trim_end());
                    self.stats.parse_failures += 1;
                }
                LineVerdict::ChecksumMismatch(computed) => {
                    warn!(
                        "Log entry checksum failed (cs8_2s={:02x}, cs8_xor={:02x}): {}",
                        computed.additive,
                        computed.xor,
                        String::from_utf8_lossy(line).trim_end()
                    );
                    self.stats.checksum_failures += 1;
                }
            }
        }

        info!(
            "Poll finished: {} accepted, {} dropped",
            self.stats.accepted,
            self.stats.dropped()
        );
        Ok(self.stats)
    }

    /// Copy raw packets to `out` until `running` is cleared
    ///
    /// # Returns
    ///
    /// * `Result<u64>` - Total bytes copied
    pub fn dump(&mut self, running: &AtomicBool, out: &mut dyn Write) -> Result<u64> {
        let mut packet = [0u8; OSP3_MAX_PACKET_SIZE];
        let mut total: u64 = 0;

        while running.load(Ordering::SeqCst) {
            let n = match self.reader.read(&mut packet, self.options.timeout) {
                Ok(n) => n,
                Err(e) if !running.load(Ordering::SeqCst) => {
                    debug!("Read interrupted by shutdown: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };
            out.write_all(&packet[..n])?;
            out.flush()?;
            total += n as u64;
        }

        info!("Dump finished: {} bytes", total);
        Ok(total)
    }
}
