//! Serial port handling
//!
//! Opens and configures the display's RS-232 line: raw mode, 9600 baud,
//! eight data bits, no parity, no flow control. Reads never block; the
//! event loop only reads after the descriptor reported readable.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits, TTYPort};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::{ProtocolError, SerialChannel, BAUD_RATE};
use crate::config::LineConfig;

/// Open and configure the serial line
pub fn open_port(name: &str, stop_bits: StopBits) -> Result<SerialChannel, ProtocolError> {
    let mut port = serialport::new(name, BAUD_RATE)
        .timeout(Duration::ZERO)
        .open_native()
        .map_err(|e| ProtocolError::Serial(format!("could not open {}: {}", name, e)))?;

    configure_port(&mut port, stop_bits)?;

    info!(port = name, baud = BAUD_RATE, "serial line open");
    Ok(SerialChannel::new(port, name))
}

/// Apply the line framing
pub fn configure_port(port: &mut TTYPort, stop_bits: StopBits) -> Result<(), ProtocolError> {
    port.set_baud_rate(BAUD_RATE)?;
    port.set_data_bits(DataBits::Eight)?;
    port.set_parity(Parity::None)?;
    port.set_stop_bits(stop_bits)?;
    port.set_flow_control(FlowControl::None)?;
    Ok(())
}

/// Open the line, retrying `open_retry` more times on failure.
///
/// Devices behind USB adapters can show up late after boot; this blocks
/// for the retry interval between attempts and is meant for start-up only.
pub fn open_with_retry(config: &LineConfig) -> Result<SerialChannel, ProtocolError> {
    let stop_bits = config.serial_stop_bits()?;
    let mut attempts_left = config.open_retry;

    loop {
        match open_port(&config.port, stop_bits) {
            Ok(channel) => return Ok(channel),
            Err(e) if attempts_left > 0 => {
                warn!(
                    port = %config.port,
                    attempts_left,
                    error = %e,
                    "serial open failed, retrying"
                );
                attempts_left -= 1;
                thread::sleep(config.open_retry_interval());
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let result = open_port("/dev/lgelink-does-not-exist", StopBits::One);
        assert!(matches!(result, Err(ProtocolError::Serial(_))));
    }

    #[test]
    fn test_open_retry_gives_up() {
        let mut config = LineConfig::new("/dev/lgelink-does-not-exist");
        config.open_retry = 2;
        config.open_retry_interval_ms = 1;
        let err = open_with_retry(&config).err().expect("open must fail");
        assert!(err.is_fatal());
    }
}
