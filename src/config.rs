//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Osp3Error, Result};
use crate::osp3::protocol::{
    OSP3_BAUD_DEFAULT, OSP3_INTERVAL_MS_MAX, OSP3_LOG_PROTOCOL_SIZE, OSP3_SUPPORTED_BAUD_RATES,
};

/// Largest accepted line buffer
const MAX_LINE_CAPACITY: usize = 4096;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-read timeout; 0 waits without a deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// What the poll loop reads
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Validated log entries
    Lines,
    /// Raw bytes as received
    Dump,
}

/// How accepted log entries are written to stdout
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The device line, unchanged
    Raw,
    /// One JSON object per entry
    Jsonl,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_mode")]
    pub mode: PollMode,

    /// Stop after this many accepted entries
    #[serde(default)]
    pub count: Option<u64>,

    #[serde(default = "default_true")]
    pub verify_parse: bool,

    #[serde(default = "default_true")]
    pub verify_checksum: bool,

    #[serde(default = "default_output_format")]
    pub output: OutputFormat,

    /// Line buffer size
    #[serde(default = "default_line_capacity")]
    pub line_capacity: usize,

    /// Drop stale entries queued before the poll starts
    #[serde(default = "default_true")]
    pub flush_on_start: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to daily files in this directory
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { OSP3_BAUD_DEFAULT }
fn default_timeout_ms() -> u64 { u64::from(OSP3_INTERVAL_MS_MAX) * 2 }

fn default_poll_mode() -> PollMode { PollMode::Lines }
fn default_true() -> bool { true }
fn default_output_format() -> OutputFormat { OutputFormat::Raw }
fn default_line_capacity() -> usize { 1024 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            mode: default_poll_mode(),
            count: None,
            verify_parse: true,
            verify_checksum: true,
            output: default_output_format(),
            line_capacity: default_line_capacity(),
            flush_on_start: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl SerialConfig {
    /// Read timeout, `None` when reads wait without a deadline
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

fn invalid(msg: impl std::fmt::Display) -> Osp3Error {
    Osp3Error::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use smartpower3::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !OSP3_SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                OSP3_SUPPORTED_BAUD_RATES
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if self.serial.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 0 and 60000"));
        }

        if self.poll.count == Some(0) {
            return Err(invalid("count must be greater than 0"));
        }

        if self.poll.line_capacity < OSP3_LOG_PROTOCOL_SIZE
            || self.poll.line_capacity > MAX_LINE_CAPACITY
        {
            return Err(invalid(format!(
                "line_capacity must be between {} and {}",
                OSP3_LOG_PROTOCOL_SIZE, MAX_LINE_CAPACITY
            )));
        }

        if !self.poll.verify_parse && self.poll.output == OutputFormat::Jsonl {
            return Err(invalid("jsonl output requires verify_parse"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if matches!(&self.logging.directory, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging directory cannot be empty when set"));
        }

        Ok(())
    }
}
