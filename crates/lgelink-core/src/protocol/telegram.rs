//! Telegram encoding
//!
//! Implements the fixed-shape ASCII request telegram.
//!
//! Telegram format:
//! - 2 bytes: Mnemonic
//! - 1 byte: Space
//! - 2 bytes: Set ID, always `00` (all displays on the line)
//! - 1 byte: Space
//! - 2 bytes: Value as uppercase hex digits
//! - 1 byte: Carriage return
//!
//! Replies are decoded byte by byte by [`ReplyParser`](super::ReplyParser);
//! the codec itself holds no state.

use std::fmt;

use super::commands::Mnemonic;

/// Encoded length of every request telegram
pub const TELEGRAM_LEN: usize = 9;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// An encoded request telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    bytes: [u8; TELEGRAM_LEN],
}

impl Telegram {
    /// Encode a mnemonic and value into wire bytes
    pub fn new(mnemonic: Mnemonic, value: u8) -> Self {
        let (hi, lo) = encode_hex(value);
        Self {
            bytes: [
                mnemonic.first(),
                mnemonic.second(),
                b' ',
                b'0',
                b'0',
                b' ',
                hi,
                lo,
                b'\r',
            ],
        }
    }

    /// Raw bytes to write to the line
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Without the trailing CR
        for &b in &self.bytes[..TELEGRAM_LEN - 1] {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// Upper and lower uppercase hex digits of a byte
pub fn encode_hex(value: u8) -> (u8, u8) {
    (
        HEX_DIGITS[(value >> 4) as usize],
        HEX_DIGITS[(value & 0x0F) as usize],
    )
}

/// Value of an uppercase hex digit, `None` for anything else
pub fn decode_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_power_on() {
        let telegram = Telegram::new(Mnemonic::new(b'K', b'A'), 0x01);
        assert_eq!(telegram.as_bytes(), b"KA 00 01\r");
        assert_eq!(telegram.as_bytes().len(), TELEGRAM_LEN);
    }

    #[test]
    fn test_encode_uppercase_hex() {
        let telegram = Telegram::new(Mnemonic::new(b'X', b'B'), 0xAF);
        assert_eq!(telegram.as_bytes(), b"XB 00 AF\r");
        assert_eq!(telegram.to_string(), "XB 00 AF");
    }

    #[test]
    fn test_status_query() {
        let telegram = Telegram::new(Mnemonic::new(b'K', b'A'), 0xFF);
        assert_eq!(telegram.as_bytes(), b"KA 00 FF\r");
    }

    #[test]
    fn test_hex_digits() {
        assert_eq!(encode_hex(0x00), (b'0', b'0'));
        assert_eq!(encode_hex(0x9C), (b'9', b'C'));
        assert_eq!(decode_hex_digit(b'7'), Some(7));
        assert_eq!(decode_hex_digit(b'E'), Some(14));
        assert_eq!(decode_hex_digit(b'e'), None);
        assert_eq!(decode_hex_digit(b'G'), None);
    }
}
