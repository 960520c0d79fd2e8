//! Command table
//!
//! Maps command indices to the two-letter mnemonics understood by the display
//! and to the settle pause the device needs after the command is accepted.
//! Indices without a mnemonic are unassigned and rejected at enqueue time.

use std::fmt;
use std::time::Duration;

/// Number of slots in the command table
pub const NUM_COMMANDS: usize = 30;

/// Two-character command identifier embedded in every telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mnemonic(pub [u8; 2]);

impl Mnemonic {
    pub const fn new(first: u8, second: u8) -> Self {
        Self([first, second])
    }

    /// First mnemonic character
    pub fn first(&self) -> u8 {
        self.0[0]
    }

    /// Second mnemonic character; the device echoes it at the start of a reply
    pub fn second(&self) -> u8 {
        self.0[1]
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// One assigned slot of the command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    /// Wire mnemonic
    pub mnemonic: Mnemonic,
    /// Wait after acceptance before the device state can be re-queried.
    /// Zero for commands that take effect immediately.
    pub settle_pause: Duration,
}

impl CommandEntry {
    const fn new(first: u8, second: u8, settle_micros: u64) -> Option<Self> {
        Some(Self {
            mnemonic: Mnemonic::new(first, second),
            settle_pause: Duration::from_micros(settle_micros),
        })
    }

    /// Whether this command is verified with a status query before being applied
    pub fn needs_settle(&self) -> bool {
        !self.settle_pause.is_zero()
    }
}

/// The display's command set, indexed by the high byte of a command code.
///
/// Index 0 is reserved for the shutdown sentinel and is never assigned.
static COMMAND_TABLE: [Option<CommandEntry>; NUM_COMMANDS] = [
    None,
    CommandEntry::new(b'K', b'A', 7_500_000), // power
    CommandEntry::new(b'K', b'C', 0),
    CommandEntry::new(b'K', b'D', 0),
    CommandEntry::new(b'K', b'E', 0),
    CommandEntry::new(b'K', b'F', 0),
    CommandEntry::new(b'K', b'G', 0),
    CommandEntry::new(b'K', b'H', 0),
    CommandEntry::new(b'K', b'I', 0),
    CommandEntry::new(b'K', b'J', 0),
    CommandEntry::new(b'K', b'K', 0),
    CommandEntry::new(b'K', b'L', 0),
    CommandEntry::new(b'K', b'M', 0),
    CommandEntry::new(b'K', b'N', 0),
    CommandEntry::new(b'K', b'Q', 0),
    CommandEntry::new(b'K', b'T', 0),
    CommandEntry::new(b'K', b'U', 0),
    CommandEntry::new(b'K', b'V', 0),
    CommandEntry::new(b'K', b'W', 0),
    CommandEntry::new(b'K', b'$', 0),
    CommandEntry::new(b'K', b'Z', 0),
    None,
    None,
    None,
    None,
    None,
    None,
    CommandEntry::new(b'M', b'C', 0),
    CommandEntry::new(b'X', b'B', 0),
    CommandEntry::new(b'X', b'Y', 0),
];

/// A command index known to be assigned in the command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandIndex {
    raw: u8,
    entry: &'static CommandEntry,
}

impl CommandIndex {
    /// Validate a raw index against the table
    pub fn new(raw: u8) -> Option<Self> {
        lookup(raw).map(|entry| Self { raw, entry })
    }

    /// Raw table index
    pub fn get(&self) -> u8 {
        self.raw
    }

    /// Table entry for this index
    pub fn entry(&self) -> &'static CommandEntry {
        self.entry
    }
}

impl fmt::Display for CommandIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} ({})", self.raw, self.entry.mnemonic)
    }
}

/// Look up a raw index; `None` for out-of-range and unassigned slots
pub fn lookup(raw: u8) -> Option<&'static CommandEntry> {
    COMMAND_TABLE.get(raw as usize).and_then(Option::as_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_assigned() {
        let power = lookup(0x01).expect("power is assigned");
        assert_eq!(power.mnemonic, Mnemonic::new(b'K', b'A'));
        assert_eq!(power.settle_pause, Duration::from_millis(7500));
        assert!(power.needs_settle());

        let xy = lookup(0x1D).expect("XY is assigned");
        assert_eq!(xy.mnemonic.to_string(), "XY");
        assert!(!xy.needs_settle());
    }

    #[test]
    fn test_lookup_unassigned() {
        assert!(lookup(0).is_none());
        assert!(lookup(0x15).is_none());
        assert!(lookup(0x1A).is_none());
        assert!(lookup(NUM_COMMANDS as u8).is_none());
        assert!(lookup(0xFF).is_none());
    }

    #[test]
    fn test_command_index_validation() {
        assert!(CommandIndex::new(0).is_none());
        let idx = CommandIndex::new(0x13).unwrap();
        assert_eq!(idx.entry().mnemonic.to_string(), "K$");
        assert_eq!(idx.to_string(), "13 (K$)");
    }

    #[test]
    fn test_assigned_count() {
        let assigned: Vec<u8> = (0..=u8::MAX).filter(|&raw| lookup(raw).is_some()).collect();
        assert_eq!(assigned.len(), 23);
        assert_eq!(assigned.first(), Some(&0x01));
        assert_eq!(assigned.last(), Some(&0x1D));
    }
}
