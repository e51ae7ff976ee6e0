//! # Buffered Line Reader
//!
//! Rebuilds newline-terminated lines from packets with arbitrary boundaries.
//!
//! The device streams 81-byte log entries but a single read returns at most
//! 64 bytes, so one entry spans several packets. Bytes read past a newline
//! are kept in a [`LookaheadBuffer`] and handed out first on the next call.
//!
//! ## Partial progress
//!
//! Every error from [`read`](BufferedLineReader::read) and
//! [`read_line`](BufferedLineReader::read_line) reports, through
//! [`Osp3Error::transferred`], how many bytes were moved into the
//! destination before the failure. Those bytes are not rolled back, and
//! buffered bytes are never lost across an error.

use std::io;
use std::time::Duration;

use tracing::{debug, trace};

use super::buffer::{copy_until_newline, LookaheadBuffer};
use super::port_trait::PacketSource;
use crate::error::{Osp3Error, Result};
use crate::osp3::protocol::OSP3_MAX_PACKET_SIZE;

/// Byte and line reader over a [`PacketSource`]
///
/// Not meant for concurrent use; every operation mutates the lookahead buffer.
#[derive(Debug)]
pub struct BufferedLineReader<S> {
    source: S,
    lookahead: LookaheadBuffer,
}

impl<S: PacketSource> BufferedLineReader<S> {
    /// Wrap a packet source with an empty lookahead buffer
    pub fn new(source: S) -> Self {
        Self {
            source,
            lookahead: LookaheadBuffer::new(),
        }
    }

    /// Bytes currently held for the next read
    pub fn buffered(&self) -> &[u8] {
        self.lookahead.as_slice()
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Unwrap the source, dropping any buffered bytes
    pub fn into_inner(self) -> S {
        self.source
    }

    /// One fetch from the source, with errors tagged by progress so far
    fn fetch(&mut self, buf: &mut [u8], timeout: Option<Duration>, transferred: usize) -> Result<usize> {
        match self.source.fetch_packet(buf, timeout) {
            Ok(0) => Err(Osp3Error::Transport {
                transferred,
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "serial device returned no data"),
            }),
            Ok(n) => {
                trace!("Received packet ({} bytes)", n);
                Ok(n.min(buf.len()))
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(Osp3Error::Timeout { transferred }),
            Err(source) => Err(Osp3Error::Transport { transferred, source }),
        }
    }

    /// Read up to `dest.len()` bytes
    ///
    /// Buffered bytes come first. If they do not fill `dest`, exactly one
    /// packet is fetched for the remaining room, so fewer than `dest.len()`
    /// bytes may be returned without error.
    ///
    /// # Errors
    ///
    /// * `Timeout` - the fetch deadline expired
    /// * `Transport` - the source failed or returned no data
    ///
    /// Either way, buffered bytes already copied into `dest` are reported in
    /// the error's `transferred` count.
    pub fn read(&mut self, dest: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        let mut transferred = self.lookahead.drain_into(dest);
        if transferred < dest.len() {
            transferred += self.fetch(&mut dest[transferred..], timeout, transferred)?;
        }
        Ok(transferred)
    }

    /// Read one complete line, terminator included
    ///
    /// Fetches as many packets as needed, each waiting up to `timeout`.
    /// Bytes after the newline in the last packet are buffered for the next
    /// call.
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Line length; `dest[len - 1]` is always `b'\n'`
    ///
    /// # Errors
    ///
    /// * `Timeout` - a fetch deadline expired before the newline arrived
    /// * `Transport` - the source failed or returned no data
    /// * `BufferTooSmall` - `dest` filled up before a newline was seen
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use smartpower3::serial::{BufferedLineReader, Osp3Serial};
    ///
    /// let serial = Osp3Serial::open("/dev/ttyUSB0", 115_200)?;
    /// let mut reader = BufferedLineReader::new(serial);
    /// let mut line = [0u8; 1024];
    /// let len = reader.read_line(&mut line, Some(Duration::from_secs(2)))?;
    /// assert_eq!(line[len - 1], b'\n');
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read_line(&mut self, dest: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        let (mut written, mut complete) = self.lookahead.drain_line_into(dest);

        while !complete {
            let room = dest.len() - written;
            if room == 0 {
                return Err(Osp3Error::BufferTooSmall {
                    capacity: dest.len(),
                    transferred: written,
                });
            }

            let mut packet = [0u8; OSP3_MAX_PACKET_SIZE];
            let want = room.min(OSP3_MAX_PACKET_SIZE);
            let received = self.fetch(&mut packet[..want], timeout, written)?;

            let (copied, found) = copy_until_newline(&mut dest[written..], &packet[..received]);
            written += copied;
            complete = found;

            // Only a packet that completed the line can leave a tail
            self.lookahead.refill(&packet[copied..received]);
        }

        debug!(
            "Read line ({} bytes, {} buffered)",
            written,
            self.lookahead.len()
        );
        Ok(written)
    }

    /// Drop buffered bytes and anything the device sent but was not read yet
    pub fn flush(&mut self) -> Result<()> {
        let dropped = self.lookahead.len();
        self.lookahead.clear();
        self.source.discard_input()?;
        debug!("Flushed input ({} buffered bytes dropped)", dropped);
        Ok(())
    }
}
