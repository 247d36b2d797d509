//! Cross-module round trips: a CoAP request, CBOR-encoded and wrapped in a
//! MUP1 frame, recovered end to end the way the transport reader would see
//! it on the wire.

use vdsp_proto::{
    cbor::{self, CborValue},
    coap::{self, Code, Message, MessageType},
    mup1::{self, FrameType},
};
use vdsp_sid::SidTable;

#[test]
fn get_request_for_interfaces_round_trips_through_the_full_stack() {
    let sids = SidTable::embedded();

    let coap_msg = Message {
        msg_type: MessageType::Con,
        code: Code::GET,
        message_id: 42,
        token: bytes::Bytes::copy_from_slice(&[0x01, 0x02, 0x03, 0x04]),
        options: coap::uri_path_options("ietf-interfaces:interfaces"),
        payload: bytes::Bytes::new(),
    };
    let coap_bytes = coap_msg.encode().expect("coap encodes");

    let mup1_bytes = mup1::encode(FrameType::Coap, &coap_bytes);

    let mut parser = mup1::Mup1Parser::new();
    let frames = parser.feed(&mup1_bytes);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_type, FrameType::Coap);

    let recovered = Message::decode(&frames[0].payload).expect("coap decodes");
    assert_eq!(recovered, coap_msg);

    let response_payload = CborValue::Map(vec![(
        "/ietf-interfaces:interfaces/interface/name".to_string(),
        CborValue::Text("eth0".to_string()),
    )]);
    let encoded_payload = cbor::encode(&response_payload, &sids).expect("cbor encodes");
    let decoded_payload = cbor::decode(&encoded_payload, &sids).expect("cbor decodes");
    assert_eq!(decoded_payload, response_payload);
}

#[test]
fn ping_frame_has_no_coap_envelope() {
    let encoded = mup1::encode(FrameType::Ping, &[]);
    let mut parser = mup1::Mup1Parser::new();
    let frames = parser.feed(&encoded);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_type, FrameType::Ping);
    assert!(frames[0].payload.is_empty());
}
