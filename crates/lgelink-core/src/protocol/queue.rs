//! Command queue
//!
//! Bounded ring buffer of pending requests. A push that does not fit is
//! rejected; queued entries are never overwritten.

use std::fmt;

use super::commands::CommandIndex;
use super::{ProtocolError, QUEUE_CAPACITY};

/// A pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEntry {
    /// Drain and stop the surrounding event loop
    Shutdown,
    /// Send `value` with the command at `index`
    Command { index: CommandIndex, value: u8 },
}

impl QueueEntry {
    /// Decode a packed code: command index in the high byte, value in the low byte.
    ///
    /// The all-zero code is the shutdown sentinel.
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        if code == 0 {
            return Ok(QueueEntry::Shutdown);
        }
        let raw = (code >> 8) as u8;
        let index =
            CommandIndex::new(raw).ok_or(ProtocolError::InvalidCommand(raw as u16))?;
        Ok(QueueEntry::Command {
            index,
            value: (code & 0xFF) as u8,
        })
    }

    /// Packed code of this entry
    pub fn code(&self) -> u16 {
        match self {
            QueueEntry::Shutdown => 0,
            QueueEntry::Command { index, value } => ((index.get() as u16) << 8) | *value as u16,
        }
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEntry::Shutdown => write!(f, "shutdown"),
            QueueEntry::Command { index, value } => {
                write!(f, "{} {:02X}", index.entry().mnemonic, value)
            }
        }
    }
}

/// Parse a textual code sequence such as `"0101, 1A00 0xFF"`.
///
/// Codes are hexadecimal (optionally `0x`-prefixed) and separated by spaces
/// or commas. The whole sequence is validated before anything is returned,
/// so a bad code anywhere rejects the batch.
pub fn parse_codes(text: &str) -> Result<Vec<QueueEntry>, ProtocolError> {
    text.split([' ', ','])
        .filter(|token| !token.is_empty())
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let code = u16::from_str_radix(digits, 16)
                .map_err(|_| ProtocolError::InvalidCode(token.to_string()))?;
            match QueueEntry::from_code(code)? {
                // the sentinel is never part of a textual sequence
                QueueEntry::Shutdown => Err(ProtocolError::InvalidCommand(0)),
                entry => Ok(entry),
            }
        })
        .collect()
}

/// Fixed-capacity FIFO of pending entries
#[derive(Debug, Clone)]
pub struct CommandQueue {
    // One spare slot so that head == tail always means empty
    slots: [Option<QueueEntry>; QUEUE_CAPACITY + 1],
    head: usize,
    tail: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            slots: [None; QUEUE_CAPACITY + 1],
            head: 0,
            tail: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.advance(self.tail) == self.head
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        (self.tail + self.slots.len() - self.head) % self.slots.len()
    }

    /// Append an entry; a full queue is left unchanged
    pub fn push(&mut self, entry: QueueEntry) -> Result<(), ProtocolError> {
        if self.is_full() {
            return Err(ProtocolError::QueueOverflow);
        }
        self.slots[self.tail] = Some(entry);
        self.tail = self.advance(self.tail);
        Ok(())
    }

    /// Remove the oldest entry
    pub fn pop(&mut self) -> Option<QueueEntry> {
        if self.is_empty() {
            return None;
        }
        let entry = self.slots[self.head].take();
        self.head = self.advance(self.head);
        entry
    }

    /// Drop every pending entry
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
        self.head = 0;
        self.tail = 0;
    }

    /// Pending entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        let n = self.slots.len();
        (0..self.len()).filter_map(move |i| self.slots[(self.head + i) % n].as_ref())
    }

    fn advance(&self, i: usize) -> usize {
        (i + 1) % self.slots.len()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
