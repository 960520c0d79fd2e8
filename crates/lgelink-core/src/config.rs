//! Line configuration
//!
//! Everything the daemon needs to bring up the display link: which device
//! to open, how persistently, and which code sequences switch the display
//! on and off. Loaded from JSON; every field has a default.

use serde::{Deserialize, Serialize};
use serialport::StopBits;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::protocol::{parse_codes, ProtocolError, RetryPolicy};

/// Serial line configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Serial device path (e.g. "/dev/ttyUSB0")
    pub port: String,
    /// Stop bits, 1 or 2
    pub stop_bits: u8,
    /// Additional open attempts after the first failure
    pub open_retry: u32,
    /// Delay between open attempts in milliseconds
    pub open_retry_interval_ms: u64,
    /// Codes sent to switch the display on
    pub on_codes: Option<String>,
    /// Codes sent to switch the display off before shutting down
    pub off_codes: Option<String>,
    /// How settling commands are verified
    pub retry_policy: RetryPolicy,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            stop_bits: 1,
            open_retry: 0,
            open_retry_interval_ms: 100,
            on_codes: None,
            off_codes: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl LineConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, ProtocolError> {
        let config: LineConfig =
            serde_json::from_str(content).map_err(|e| ProtocolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Check the stop bits and both code sequences
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.serial_stop_bits()?;
        for codes in [&self.on_codes, &self.off_codes].into_iter().flatten() {
            parse_codes(codes)?;
        }
        Ok(())
    }

    pub fn serial_stop_bits(&self) -> Result<StopBits, ProtocolError> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            n => Err(ProtocolError::Config(format!(
                "unsupported stop bit count: {}",
                n
            ))),
        }
    }

    pub fn open_retry_interval(&self) -> Duration {
        Duration::from_millis(self.open_retry_interval_ms)
    }
}
