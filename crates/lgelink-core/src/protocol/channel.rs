//! Line channel
//!
//! The byte stream between the engine and the display. The engine only needs
//! reads, writes, a buffer flush and a descriptor to hand to the event loop,
//! so tests can stand in an in-memory line for the tty.

use serialport::{SerialPort, TTYPort};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

/// Byte channel the engine talks to the display through.
///
/// The descriptor is what the event loop watches for readability.
pub trait LineChannel: Read + Write + AsRawFd {
    /// Discard bytes buffered in either direction
    fn clear_buffers(&mut self) -> io::Result<()>;

    /// Human-readable name for log messages
    fn name(&self) -> &str;
}

/// Serial tty implementing LineChannel
pub struct SerialChannel {
    port: TTYPort,
    name: String,
}

impl SerialChannel {
    pub fn new(port: TTYPort, name: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
        }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl AsRawFd for SerialChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.port.as_raw_fd()
    }
}

impl LineChannel for SerialChannel {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::other)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
