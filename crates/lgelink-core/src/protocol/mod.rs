//! Serial Protocol Communication
//!
//! Implements the LG display control protocol: ASCII request telegrams
//! answered by `OK`/`NG` acknowledgements, driven without blocking from an
//! external event loop.

pub mod channel;
pub mod commands;
mod engine;
mod error;
mod queue;
mod reply;
pub mod serial;
mod telegram;

pub use channel::{LineChannel, SerialChannel};
pub use commands::{CommandEntry, CommandIndex, Mnemonic};
pub use engine::{Engine, InFlight, Outcome, Phase, RetryPolicy, Stage};
pub use error::ProtocolError;
pub use queue::{parse_codes, CommandQueue, QueueEntry};
pub use reply::{Progress, Reply, ReplyParser};
pub use serial::{open_port, open_with_retry};
pub use telegram::{Telegram, TELEGRAM_LEN};

use std::time::Duration;

/// Fixed line speed of the display's RS-232 port
pub const BAUD_RATE: u32 = 9600;

/// Wait for the first byte of a reply
pub const REPLY_START_TIMEOUT: Duration = Duration::from_secs(6);

/// Wait between bytes once a reply has started
pub const INTER_BYTE_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum number of pending queue entries
pub const QUEUE_CAPACITY: usize = 128;

/// Value that reads the current device state instead of changing it
pub const STATUS_QUERY: u8 = 0xFF;

/// Bytes read from the line per readiness event
pub const READ_CHUNK: usize = 99;
