//! Trait abstraction for the packet-oriented serial transport to enable testing

use std::io;
use std::time::Duration;

/// Source of raw serial packets
///
/// `fetch_packet` returns between 1 and `buf.len()` freshly received bytes.
/// A deadline passing without data is reported as `io::ErrorKind::TimedOut`.
/// A `None` timeout waits without a deadline.
#[cfg_attr(test, mockall::automock)]
pub trait PacketSource {
    /// Read whatever bytes are currently available, up to `buf.len()`
    fn fetch_packet(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize>;

    /// Drop data received but not yet read
    fn discard_input(&mut self) -> io::Result<()>;
}
