//! # OSP3 Protocol Constants and Types
//!
//! Core definitions for the Smart Power 3 serial log protocol.
//!
//! One log entry per logging tick, ASCII, CRLF-terminated:
//!
//! ```text
//! 0000815169,15296,0036,00550,0,00000,0000,00000,0,00,00000,0000,00000,0,00,14,12\r\n
//! | ms       | input power          | channel 0               | channel 1               | cs2|xor|
//! ```

use serde::Serialize;

/// Maximum serial packet size delivered by one read
pub const OSP3_MAX_PACKET_SIZE: usize = 64;

/// Log entry length without the trailing "\r\n"
pub const OSP3_LOG_PAYLOAD_SIZE: usize = 79;

/// Log entry length including the trailing "\r\n"
pub const OSP3_LOG_PROTOCOL_SIZE: usize = 81;

/// Separator between fields
pub const OSP3_FIELD_SEPARATOR: u8 = b',';

/// Minimum supported serial baud rate
pub const OSP3_BAUD_MIN: u32 = 9600;

/// Maximum supported serial baud rate
pub const OSP3_BAUD_MAX: u32 = 921_600;

/// Default serial baud rate used on the device UI
pub const OSP3_BAUD_DEFAULT: u32 = 115_200;

/// Baud rates the device can be configured for
pub const OSP3_SUPPORTED_BAUD_RATES: &[u32] = &[
    9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 500_000, 576_000, 921_600,
];

/// Logging intervals the device can be configured for (ms)
pub const OSP3_SUPPORTED_INTERVALS_MS: &[u32] = &[5, 10, 50, 100, 500, 1000];

/// Default serial logging interval used on the device UI (ms)
pub const OSP3_INTERVAL_MS_DEFAULT: u32 = 10;

/// Maximum serial logging interval (ms)
pub const OSP3_INTERVAL_MS_MAX: u32 = 1000;

/// Position and width of one fixed-width field within a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Name used in error messages
    pub name: &'static str,
    /// Byte offset of the first character
    pub offset: usize,
    /// Number of characters
    pub width: usize,
}

impl Field {
    const fn first(name: &'static str, width: usize) -> Self {
        Self { name, offset: 0, width }
    }

    /// The field following `self` after one separator
    const fn then(self, name: &'static str, width: usize) -> Self {
        Self {
            name,
            offset: self.end() + 1,
            width,
        }
    }

    /// Offset one past the last character
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }
}

pub const FIELD_TIMESTAMP: Field = Field::first("timestamp", 10);

pub const FIELD_MV_IN: Field = FIELD_TIMESTAMP.then("input mV", 5);
pub const FIELD_MA_IN: Field = FIELD_MV_IN.then("input mA", 4);
pub const FIELD_MW_IN: Field = FIELD_MA_IN.then("input mW", 5);
pub const FIELD_ONOFF_IN: Field = FIELD_MW_IN.then("input on/off", 1);

pub const FIELD_MV_0: Field = FIELD_ONOFF_IN.then("channel 0 mV", 5);
pub const FIELD_MA_0: Field = FIELD_MV_0.then("channel 0 mA", 4);
pub const FIELD_MW_0: Field = FIELD_MA_0.then("channel 0 mW", 5);
pub const FIELD_ONOFF_0: Field = FIELD_MW_0.then("channel 0 on/off", 1);
pub const FIELD_INTR_0: Field = FIELD_ONOFF_0.then("channel 0 interrupts", 2);

pub const FIELD_MV_1: Field = FIELD_INTR_0.then("channel 1 mV", 5);
pub const FIELD_MA_1: Field = FIELD_MV_1.then("channel 1 mA", 4);
pub const FIELD_MW_1: Field = FIELD_MA_1.then("channel 1 mW", 5);
pub const FIELD_ONOFF_1: Field = FIELD_MW_1.then("channel 1 on/off", 1);
pub const FIELD_INTR_1: Field = FIELD_ONOFF_1.then("channel 1 interrupts", 2);

pub const FIELD_CHECKSUM_2S: Field = FIELD_INTR_1.then("checksum8 2s complement", 2);
pub const FIELD_CHECKSUM_XOR: Field = FIELD_CHECKSUM_2S.then("checksum8 xor", 2);

/// All fields in wire order
pub const OSP3_FIELDS: [Field; 17] = [
    FIELD_TIMESTAMP,
    FIELD_MV_IN,
    FIELD_MA_IN,
    FIELD_MW_IN,
    FIELD_ONOFF_IN,
    FIELD_MV_0,
    FIELD_MA_0,
    FIELD_MW_0,
    FIELD_ONOFF_0,
    FIELD_INTR_0,
    FIELD_MV_1,
    FIELD_MA_1,
    FIELD_MW_1,
    FIELD_ONOFF_1,
    FIELD_INTR_1,
    FIELD_CHECKSUM_2S,
    FIELD_CHECKSUM_XOR,
];

/// Number of leading bytes covered by both checksums
///
/// Everything before the two's complement field, including the separator
/// that precedes it.
pub const OSP3_CHECKSUM_SPAN: usize = FIELD_CHECKSUM_2S.offset;

/// Channel interrupt bitmask
///
/// | Bit | Function                                        |
/// |-----|-------------------------------------------------|
/// | 0   | Overvoltage protection                          |
/// | 1   | Constant current function                       |
/// | 2   | Short-circuit protection                        |
/// | 3   | Power-on                                        |
/// | 4   | Watchdog                                        |
/// | 5   | Overtemperature protection (165 °C junction)    |
/// | 6   | Overtemperature warning (145 °C junction)       |
/// | 7   | Inductor peak current protection                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Interrupts(pub u8);

impl Interrupts {
    pub const OVERVOLTAGE_PROT: u8 = 1;
    pub const CONSTANT_CURRENT_FUNC: u8 = 1 << 1;
    pub const SHORT_CIRCUIT_PROT: u8 = 1 << 2;
    pub const POWER_ON: u8 = 1 << 3;
    pub const WATCHDOG: u8 = 1 << 4;
    pub const OVERTEMPERATURE_PROT: u8 = 1 << 5;
    pub const OVERTEMPERATURE_WARN: u8 = 1 << 6;
    pub const INDUCTOR_PEAK_CURRENT_PROT: u8 = 1 << 7;

    const NAMES: [(u8, &'static str); 8] = [
        (Self::OVERVOLTAGE_PROT, "overvoltage protection"),
        (Self::CONSTANT_CURRENT_FUNC, "constant current"),
        (Self::SHORT_CIRCUIT_PROT, "short-circuit protection"),
        (Self::POWER_ON, "power-on"),
        (Self::WATCHDOG, "watchdog"),
        (Self::OVERTEMPERATURE_PROT, "overtemperature protection"),
        (Self::OVERTEMPERATURE_WARN, "overtemperature warning"),
        (Self::INDUCTOR_PEAK_CURRENT_PROT, "inductor peak current protection"),
    ];

    /// Raw bitmask
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `flag` is set
    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Human-readable names of the raised flags, lowest bit first
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |&(flag, _)| self.contains(flag))
            .map(|(_, name)| name)
    }
}

/// Input power section (no interrupt field)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputSection {
    pub millivolts: u32,
    pub milliamps: u32,
    pub milliwatts: u32,
    pub enabled: bool,
}

/// Output channel section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSection {
    pub millivolts: u32,
    pub milliamps: u32,
    pub milliwatts: u32,
    pub enabled: bool,
    pub interrupts: Interrupts,
}

/// CheckSum8 values carried at the end of each log entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Checksums {
    /// CheckSum8 two's complement
    pub additive: u8,
    /// CheckSum8 XOR
    pub xor: u8,
}

/// One parsed log entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Device uptime in milliseconds
    pub timestamp_ms: u64,
    pub input: InputSection,
    pub channel0: ChannelSection,
    pub channel1: ChannelSection,
    pub checksum: Checksums,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        assert_eq!(FIELD_TIMESTAMP.offset, 0);
        assert_eq!(FIELD_MV_IN.offset, 11);
        assert_eq!(FIELD_ONOFF_IN.offset, 28);
        assert_eq!(FIELD_MV_0.offset, 30);
        assert_eq!(FIELD_INTR_0.offset, 49);
        assert_eq!(FIELD_MV_1.offset, 52);
        assert_eq!(FIELD_INTR_1.offset, 71);
        assert_eq!(FIELD_CHECKSUM_2S.offset, 74);
        assert_eq!(FIELD_CHECKSUM_XOR.offset, 77);
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(FIELD_CHECKSUM_XOR.end(), OSP3_LOG_PAYLOAD_SIZE);
        assert_eq!(OSP3_LOG_PAYLOAD_SIZE + 2, OSP3_LOG_PROTOCOL_SIZE);
        assert_eq!(OSP3_CHECKSUM_SPAN, 74);
        // One entry never fits in one packet
        assert!(OSP3_LOG_PROTOCOL_SIZE > OSP3_MAX_PACKET_SIZE);
    }

    #[test]
    fn test_fields_are_contiguous() {
        for pair in OSP3_FIELDS.windows(2) {
            assert_eq!(pair[0].end() + 1, pair[1].offset, "gap after {}", pair[0].name);
        }
    }

    #[test]
    fn test_baud_constants() {
        assert!(OSP3_SUPPORTED_BAUD_RATES.contains(&OSP3_BAUD_DEFAULT));
        assert_eq!(OSP3_SUPPORTED_BAUD_RATES.first(), Some(&OSP3_BAUD_MIN));
        assert_eq!(OSP3_SUPPORTED_BAUD_RATES.last(), Some(&OSP3_BAUD_MAX));
        assert!(OSP3_SUPPORTED_INTERVALS_MS.contains(&OSP3_INTERVAL_MS_DEFAULT));
    }

    #[test]
    fn test_interrupt_flags() {
        let intr = Interrupts(Interrupts::POWER_ON | Interrupts::OVERTEMPERATURE_WARN);
        assert!(intr.contains(Interrupts::POWER_ON));
        assert!(intr.contains(Interrupts::OVERTEMPERATURE_WARN));
        assert!(!intr.contains(Interrupts::WATCHDOG));
        assert!(!intr.is_empty());
        assert_eq!(
            intr.names().collect::<Vec<_>>(),
            vec!["power-on", "overtemperature warning"]
        );
    }

    #[test]
    fn test_interrupt_bit_positions() {
        assert_eq!(Interrupts::OVERVOLTAGE_PROT, 0x01);
        assert_eq!(Interrupts::SHORT_CIRCUIT_PROT, 0x04);
        assert_eq!(Interrupts::OVERTEMPERATURE_PROT, 0x20);
        assert_eq!(Interrupts::INDUCTOR_PEAK_CURRENT_PROT, 0x80);
        assert_eq!(Interrupts(0xFF).names().count(), 8);
        assert!(Interrupts::default().is_empty());
    }

    #[test]
    fn test_record_serializes_interrupts_as_number() {
        let mut record = LogRecord::default();
        record.channel1.interrupts = Interrupts(0x0A);
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["channel1"]["interrupts"], 10);
        assert_eq!(json["checksum"]["xor"], 0);
    }
}
