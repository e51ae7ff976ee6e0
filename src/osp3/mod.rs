//! # OSP3 Log Entry Module
//!
//! Codec for the fixed-width text log entries streamed by an ODROID Smart Power 3.
//!
//! This module handles:
//! - Log entry layout constants and the parsed record types
//! - Strict fixed-offset parsing of the 17 fields
//! - CheckSum8 two's complement and CheckSum8 XOR verification
//! - Rendering a record back into the device layout

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod checksum;
