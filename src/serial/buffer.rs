//! Lookahead storage for bytes received past a line boundary

use crate::osp3::protocol::OSP3_MAX_PACKET_SIZE;

/// Line terminator
pub const NEWLINE: u8 = b'\n';

/// Copy from `src` into `dest` up to and including the first newline
///
/// Copies at most `min(dest.len(), src.len())` bytes.
///
/// # Returns
///
/// * `(usize, bool)` - Bytes copied, and whether the last one was a newline
pub fn copy_until_newline(dest: &mut [u8], src: &[u8]) -> (usize, bool) {
    let limit = dest.len().min(src.len());
    let (len, found) = match src[..limit].iter().position(|&b| b == NEWLINE) {
        Some(pos) => (pos + 1, true),
        None => (limit, false),
    };
    dest[..len].copy_from_slice(&src[..len]);
    (len, found)
}

/// Consume-from-front, refill-at-zero buffer holding at most one packet
///
/// `start + count <= OSP3_MAX_PACKET_SIZE` always holds, and `start` returns
/// to 0 whenever the buffer runs empty.
#[derive(Debug, Clone)]
pub struct LookaheadBuffer {
    buf: [u8; OSP3_MAX_PACKET_SIZE],
    start: usize,
    count: usize,
}

impl Default for LookaheadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LookaheadBuffer {
    /// Capacity in bytes, one transport packet
    pub const CAPACITY: usize = OSP3_MAX_PACKET_SIZE;

    pub fn new() -> Self {
        Self {
            buf: [0; OSP3_MAX_PACKET_SIZE],
            start: 0,
            count: 0,
        }
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Unconsumed bytes, oldest first
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.start..self.start + self.count]
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.count);
        self.count -= n;
        self.start = if self.count > 0 { self.start + n } else { 0 };
    }

    /// Move up to `dest.len()` buffered bytes into the front of `dest`
    pub fn drain_into(&mut self, dest: &mut [u8]) -> usize {
        let n = self.count.min(dest.len());
        dest[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
        self.consume(n);
        n
    }

    /// Move buffered bytes into `dest` up to and including the first newline
    ///
    /// Bytes after the newline stay buffered.
    pub fn drain_line_into(&mut self, dest: &mut [u8]) -> (usize, bool) {
        let (n, found) = copy_until_newline(dest, &self.buf[self.start..self.start + self.count]);
        self.consume(n);
        (n, found)
    }

    /// Store the unconsumed tail of a freshly fetched packet
    ///
    /// Only called once everything buffered has been drained; `bytes` never
    /// exceeds one packet.
    pub fn refill(&mut self, bytes: &[u8]) {
        debug_assert!(self.is_empty(), "refill with {} bytes still buffered", self.count);
        debug_assert!(bytes.len() <= Self::CAPACITY);

        let n = bytes.len().min(Self::CAPACITY);
        self.buf[..n].copy_from_slice(&bytes[..n]);
        self.start = 0;
        self.count = n;
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.start = 0;
        self.count = 0;
    }
}
