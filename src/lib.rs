//! # Smart Power 3 Library
//!
//! Read power log entries from an ODROID Smart Power 3 over its serial port.
//!
//! The device streams fixed-width CSV log entries, but the serial link
//! hands them over in packets of at most 64 bytes. This library rebuilds
//! the lines, parses the fields and verifies the embedded checksums.

pub mod config;
pub mod error;
pub mod osp3;
pub mod poll;
pub mod serial;
pub mod telemetry;
