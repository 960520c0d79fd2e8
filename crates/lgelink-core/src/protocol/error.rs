//! Protocol errors

use thiserror::Error;

use super::commands::Mnemonic;

/// Errors that can occur while driving the display over the serial line
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid command index: {0:#04x}")]
    InvalidCommand(u16),

    #[error("Invalid command code: '{0}'")]
    InvalidCode(String),

    #[error("Command queue overflow")]
    QueueOverflow,

    #[error("Shutdown sentinel may only be queued while the engine is idle")]
    IllegalSentinel,

    #[error("Command {mnemonic} rejected by device (value {value:#04x})")]
    Rejected { mnemonic: Mnemonic, value: u8 },

    #[error("Command {mnemonic} timed out waiting for a reply")]
    Timeout { mnemonic: Mnemonic },

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Serial line is not open")]
    NotOpen,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error leaves the line unusable.
    ///
    /// Protocol failures (rejection, timeout) only discard the queue; the
    /// engine stays usable. I/O and port errors should tear the engine down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::Serial(_) | ProtocolError::NotOpen
        )
    }
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        ProtocolError::Serial(e.to_string())
    }
}
