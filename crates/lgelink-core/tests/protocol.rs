use lgelink_core::protocol::commands::lookup;
use lgelink_core::protocol::{
    parse_codes, Mnemonic, Progress, ProtocolError, Reply, ReplyParser, Telegram, STATUS_QUERY,
};
use pretty_assertions::assert_eq;

fn feed(marker: u8, bytes: &[u8]) -> Progress {
    let mut parser = ReplyParser::new();
    parser.begin(marker);
    parser.feed_slice(bytes).0
}

#[test]
fn test_every_assigned_command_encodes() {
    for (index, entry) in (0..=u8::MAX).filter_map(|raw| Some((raw, lookup(raw)?))) {
        let telegram = Telegram::new(entry.mnemonic, 0x3C);
        let bytes = telegram.as_bytes();
        assert_eq!(bytes.len(), 9, "command {}", index);
        assert_eq!(&bytes[..2], &entry.mnemonic.0);
        assert_eq!(&bytes[2..], b" 00 3C\r");
    }
}

#[test]
fn test_accepted_reply_with_arbitrary_filler() {
    // mnemonic, four arbitrary bytes, OK, value, two arbitrary bytes
    let progress = feed(b'Y', b"XY\x01#~\x7fOK2A\xfe\x00");
    assert_eq!(
        progress,
        Progress::Complete(Reply {
            accepted: true,
            value: 0x2A
        })
    );
}

#[test]
fn test_rejected_reply_regardless_of_digits() {
    for value in [0x00u8, 0x5A, 0xFF] {
        let telegram = Telegram::new(Mnemonic::new(b'K', b'A'), value);
        let digits = &telegram.as_bytes()[6..8];
        let mut reply = b"A 01 NG".to_vec();
        reply.extend_from_slice(digits);
        reply.extend_from_slice(b"x\r");
        match feed(b'A', &reply) {
            Progress::Complete(reply) => assert!(!reply.accepted),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_status_query_value_round_trip() {
    let power = lookup(0x01).unwrap().mnemonic;
    let telegram = Telegram::new(power, STATUS_QUERY);
    let digits = &telegram.as_bytes()[6..8];
    assert_eq!(digits, b"FF");

    let mut reply = b"A 01 OK".to_vec();
    reply.extend_from_slice(digits);
    reply.extend_from_slice(b"x\r");
    assert_eq!(
        feed(b'A', &reply),
        Progress::Complete(Reply {
            accepted: true,
            value: 255
        })
    );
}

#[test]
fn test_pure_noise_never_completes() {
    let mut parser = ReplyParser::new();
    parser.begin(b'A');
    for _ in 0..50 {
        for byte in (0..=u8::MAX).filter(|&b| b != b'A') {
            assert_eq!(parser.feed(byte), Progress::Pending);
        }
    }
    assert_eq!(parser.position(), 1);
}

#[test]
fn test_batch_order_and_validation() {
    let entries = parse_codes("0101 021A, 0302").unwrap();
    let codes: Vec<u16> = entries.iter().map(|e| e.code()).collect();
    assert_eq!(codes, vec![0x0101, 0x021A, 0x0302]);

    let err = parse_codes("0101, 0302 1F00").unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidCommand(0x1F)));
}

#[test]
fn test_protocol_error_display() {
    let err = ProtocolError::Timeout {
        mnemonic: Mnemonic::new(b'X', b'B'),
    };
    assert_eq!(err.to_string(), "Command XB timed out waiting for a reply");
    assert_eq!(
        ProtocolError::QueueOverflow.to_string(),
        "Command queue overflow"
    );
}
