use proptest::prelude::*;

use crate::error::PtpError;
use crate::protocol::ptp::frame::{Frame, MessageType};

proptest! {
    #[test]
    fn test_message_type_any_byte_roundtrip(b in any::<u8>()) {
        prop_assert_eq!(MessageType::from_byte(b).as_byte(), b);
    }

    #[test]
    fn test_frame_encode_decode_roundtrip(
        type_byte in any::<u8>(),
        sequence in any::<u16>(),
        timestamp in any::<u64>()
    ) {
        let frame = Frame::new(MessageType::from_byte(type_byte), sequence, timestamp);
        let decoded = Frame::decode(&frame.encode()).expect("Decode failed");
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_short_buffer_always_fails(bytes in proptest::collection::vec(any::<u8>(), 0..11)) {
        let is_malformed = matches!(
            Frame::decode(&bytes),
            Err(PtpError::MalformedFrame { needed: 11, .. })
        );
        prop_assert!(is_malformed);
    }

    #[test]
    fn test_decode_long_buffer_never_fails(bytes in proptest::collection::vec(any::<u8>(), 11..64)) {
        let frame = Frame::decode(&bytes).expect("Decode failed");
        let encoded = frame.encode();
        prop_assert_eq!(encoded.as_slice(), &bytes[..11]);
    }
}
