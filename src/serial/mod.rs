//! # Serial Communication Module
//!
//! Handles the serial link to an ODROID Smart Power 3.
//!
//! This module handles:
//! - Opening the serial port at a supported baud rate (8N1)
//! - Fetching raw packets with a per-read timeout
//! - Reassembling packets into log entry lines
//! - Flushing stale input

pub mod buffer;
pub mod port_trait;
pub mod reader;

pub use buffer::LookaheadBuffer;
pub use port_trait::PacketSource;
pub use reader::BufferedLineReader;

use std::io::{self, Read};
use std::time::Duration;

use crate::error::{Osp3Error, Result};
use crate::osp3::protocol::{OSP3_BAUD_DEFAULT, OSP3_SUPPORTED_BAUD_RATES};
use tokio_serial::{ClearBuffer, SerialPort};
use tracing::{debug, info};

/// Wait used per underlying read when no deadline was requested
const BLOCKING_READ_SLICE: Duration = Duration::from_secs(60);

/// Smart Power 3 serial port handle
///
/// Implements [`PacketSource`]; wrap it in a [`BufferedLineReader`] to read
/// log entries.
pub struct Osp3Serial {
    /// Serial port handle
    port: Box<dyn SerialPort>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for Osp3Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Osp3Serial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

/// Resolve a requested baud rate, 0 meaning the device default
///
/// # Errors
///
/// Returns `Serial` if the device does not support the rate.
pub fn resolve_baud_rate(baud_rate: u32) -> Result<u32> {
    let baud_rate = if baud_rate == 0 { OSP3_BAUD_DEFAULT } else { baud_rate };
    if !OSP3_SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        return Err(Osp3Error::Serial(format!("Unsupported baud rate: {}", baud_rate)));
    }
    Ok(baud_rate)
}

impl Osp3Serial {
    /// Open a connection to a Smart Power 3
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate configured on the device, or 0 for the default (115200)
    ///
    /// # Errors
    ///
    /// Returns error if the baud rate is unsupported or the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use smartpower3::serial::Osp3Serial;
    ///
    /// let serial = Osp3Serial::open("/dev/ttyUSB0", 115_200)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let baud_rate = resolve_baud_rate(baud_rate)?;
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = Self::open_port(path, baud_rate)?;
        info!("Opened Smart Power 3 at {} ({} baud)", path, baud_rate);

        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(BLOCKING_READ_SLICE)
            .open()
            .map_err(|e| Osp3Error::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl PacketSource for Osp3Serial {
    fn fetch_packet(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize> {
        self.port.set_timeout(timeout.unwrap_or(BLOCKING_READ_SLICE))?;

        loop {
            match self.port.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // No deadline: keep waiting
                Err(e) if e.kind() == io::ErrorKind::TimedOut && timeout.is_none() => continue,
                result => return result,
            }
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
