//! Property-based tests for frame encoding/decoding across arbitrary bodies.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use proptest::prelude::*;
use rpc_proto::{Flags, Frame, MessageType};

fn arb_message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Request),
        Just(MessageType::Response),
        Just(MessageType::Stream),
        Just(MessageType::Error),
        Just(MessageType::Ping),
        Just(MessageType::Pong),
    ]
}

proptest! {
    #[test]
    fn frame_round_trip(
        message_type in arb_message_type(),
        flag_bits in 0u8..=0x0f,
        service_id in any::<u32>(),
        method_id in any::<u32>(),
        request_id in any::<u32>(),
        stream_id in any::<u32>(),
        sequence_number in any::<u32>(),
        body in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let frame = Frame::new(
            message_type,
            Flags::from_bits_truncate(flag_bits),
            service_id,
            method_id,
            request_id,
            stream_id,
            sequence_number,
            Bytes::from(body),
        );
        let encoded = frame.encode();
        let decoded = Frame::decode(&encoded).expect("well-formed frame decodes");
        prop_assert_eq!(decoded, frame);
    }
}
