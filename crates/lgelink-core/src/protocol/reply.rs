//! Reply parsing
//!
//! Byte-at-a-time acknowledgement parser. A reply looks like
//!
//! ```text
//! a 01 OK01x
//! ^ ^^^^ ^^^^ ^
//! | |    | |  trailer (2 bytes, ignored)
//! | |    | value, two uppercase hex digits
//! | |    result marker, OK or NG
//! | status field (4 bytes, ignored)
//! echo of the second mnemonic character
//! ```
//!
//! Every (state, byte) pair has a successor, so the parser never fails on
//! its own: garbage sends it back to scanning for the start marker and a
//! reply that never completes surfaces as a timeout in the engine.

use super::telegram::decode_hex_digit;

const IDLE: u8 = 0;
const AWAIT_START: u8 = 1;
const RESULT_CLASS: u8 = 6;
const RESULT_DETAIL: u8 = 7;
const VALUE_HIGH: u8 = 8;
const VALUE_LOW: u8 = 9;
const TERMINATOR: u8 = 12;

/// A fully parsed acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// `OK` (true) or `NG` (false)
    pub accepted: bool,
    /// Value field of the reply
    pub value: u8,
}

/// Result of feeding bytes to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No reply is expected
    Idle,
    /// Mid-telegram
    Pending,
    /// Telegram complete; the parser is idle again
    Complete(Reply),
}

/// Reply state machine
#[derive(Debug, Clone, Default)]
pub struct ReplyParser {
    state: u8,
    start_marker: u8,
    value: u8,
    accepted: bool,
}

impl ReplyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the parser for a reply starting with `start_marker`
    pub fn begin(&mut self, start_marker: u8) {
        self.state = AWAIT_START;
        self.start_marker = start_marker;
        self.value = 0;
        self.accepted = false;
    }

    /// Drop any partial reply
    pub fn reset(&mut self) {
        self.state = IDLE;
    }

    pub fn is_idle(&self) -> bool {
        self.state == IDLE
    }

    /// Current position in the acknowledgement grammar (0 = idle)
    pub fn position(&self) -> u8 {
        self.state
    }

    /// Consume one byte
    pub fn feed(&mut self, byte: u8) -> Progress {
        let next = match self.state {
            IDLE => return Progress::Idle,
            AWAIT_START => self.scan(byte),
            RESULT_CLASS => match byte {
                b'N' | b'O' => RESULT_DETAIL,
                _ => self.scan(byte),
            },
            RESULT_DETAIL => match byte {
                b'G' => {
                    self.accepted = false;
                    VALUE_HIGH
                }
                b'K' => {
                    self.accepted = true;
                    VALUE_HIGH
                }
                _ => self.scan(byte),
            },
            VALUE_HIGH => match decode_hex_digit(byte) {
                Some(nibble) => {
                    self.value = nibble << 4;
                    VALUE_LOW
                }
                None => self.scan(byte),
            },
            VALUE_LOW => match decode_hex_digit(byte) {
                Some(nibble) => {
                    self.value |= nibble;
                    VALUE_LOW + 1
                }
                None => self.scan(byte),
            },
            // status field and trailer
            state => state + 1,
        };

        if next >= TERMINATOR {
            self.state = IDLE;
            return Progress::Complete(Reply {
                accepted: self.accepted,
                value: self.value,
            });
        }

        self.state = next;
        Progress::Pending
    }

    /// Consume bytes until a reply completes.
    ///
    /// Returns the progress after the last consumed byte and how many bytes
    /// were consumed; bytes after a completed reply are left untouched.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> (Progress, usize) {
        let mut progress = if self.is_idle() {
            Progress::Idle
        } else {
            Progress::Pending
        };

        for (i, &byte) in bytes.iter().enumerate() {
            progress = self.feed(byte);
            if matches!(progress, Progress::Complete(_) | Progress::Idle) {
                return (progress, i + 1);
            }
        }

        (progress, bytes.len())
    }

    // Start-marker rule, also applied to bytes that break the grammar
    fn scan(&self, byte: u8) -> u8 {
        if byte == self.start_marker {
            AWAIT_START + 1
        } else {
            AWAIT_START
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(marker: u8, bytes: &[u8]) -> Progress {
        let mut parser = ReplyParser::new();
        parser.begin(marker);
        parser.feed_slice(bytes).0
    }

    #[test]
    fn test_accepted_reply() {
        let progress = parse(b'Y', b"Y 01 OK2Ax\r");
        assert_eq!(
            progress,
            Progress::Complete(Reply {
                accepted: true,
                value: 0x2A
            })
        );
    }

    #[test]
    fn test_mnemonic_echo_with_leading_first_char() {
        // X is noise while scanning for Y
        let progress = parse(b'Y', b"XY 01 OK2Ax\r");
        assert_eq!(
            progress,
            Progress::Complete(Reply {
                accepted: true,
                value: 0x2A
            })
        );
    }

    #[test]
    fn test_rejected_reply_ignores_digits() {
        for digits in [b"00", b"7F", b"FF"] {
            let mut reply = b"a 01 NG".to_vec();
            reply.extend_from_slice(digits);
            reply.extend_from_slice(b"x\r");
            match parse(b'a', &reply) {
                Progress::Complete(r) => assert!(!r.accepted),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_completes_on_entering_terminator() {
        let mut parser = ReplyParser::new();
        parser.begin(b'A');
        let (progress, used) = parser.feed_slice(b"A 01 OK01x\rA 01");
        assert!(matches!(progress, Progress::Complete(_)));
        assert_eq!(used, 11);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_leading_noise_is_skipped() {
        let progress = parse(b'A', b"\x00\xffzzA 01 OK01x\r");
        assert_eq!(
            progress,
            Progress::Complete(Reply {
                accepted: true,
                value: 0x01
            })
        );
    }

    #[test]
    fn test_bad_result_marker_resyncs() {
        let mut parser = ReplyParser::new();
        parser.begin(b'A');
        // 'Q' at the result position resets to scanning
        assert_eq!(parser.feed_slice(b"A 01 Q").0, Progress::Pending);
        assert_eq!(parser.position(), AWAIT_START);
    }

    #[test]
    fn test_resync_byte_can_be_start_marker() {
        let mut parser = ReplyParser::new();
        parser.begin(b'A');
        parser.feed_slice(b"A 01 ");
        assert_eq!(parser.position(), RESULT_CLASS);
        // 'A' breaks the grammar but is itself a start marker
        parser.feed(b'A');
        assert_eq!(parser.position(), AWAIT_START + 1);
        let progress = parser.feed_slice(b" 01 OK05x\r").0;
        assert_eq!(
            progress,
            Progress::Complete(Reply {
                accepted: true,
                value: 0x05
            })
        );
    }

    #[test]
    fn test_lowercase_hex_resyncs() {
        let mut parser = ReplyParser::new();
        parser.begin(b'A');
        parser.feed_slice(b"A 01 OK");
        parser.feed(b'f');
        assert_eq!(parser.position(), AWAIT_START);
    }

    #[test]
    fn test_noise_never_completes() {
        let mut parser = ReplyParser::new();
        parser.begin(b'A');
        let noise: Vec<u8> = (0..2000u32)
            .map(|i| (i * 7 % 251) as u8)
            .filter(|&b| b != b'A')
            .collect();
        let (progress, used) = parser.feed_slice(&noise);
        assert_eq!(progress, Progress::Pending);
        assert_eq!(used, noise.len());
    }

    #[test]
    fn test_idle_ignores_bytes() {
        let mut parser = ReplyParser::new();
        assert_eq!(parser.feed(b'A'), Progress::Idle);
        assert_eq!(parser.feed_slice(b"A 01 OK01x\r"), (Progress::Idle, 1));
    }

    #[test]
    fn test_status_value_ff() {
        let progress = parse(b'A', b"A 01 OKFFx\r");
        assert_eq!(
            progress,
            Progress::Complete(Reply {
                accepted: true,
                value: 255
            })
        );
    }
}
