//! Wire framing across message boundaries

use bytes::{Bytes, BytesMut};
use nanosp_core::codec::{encode_message, wire_len, CodecError, MessageDecoder};
use nanosp_core::message::{Ancillary, Message};

#[test]
fn test_ancillary_chain_survives_framing() {
    let msg = Message::from_parts(
        "payload",
        vec![
            Ancillary::sp_header(Bytes::from_static(&[0x80, 0, 0, 7])),
            Ancillary::new(9, 2, Bytes::new()),
            Ancillary::new(-4, 11, vec![1u8; 13]),
        ],
    );

    let mut buf = BytesMut::new();
    encode_message(&msg, &mut buf);
    assert_eq!(buf.len(), wire_len(&msg));

    let mut decoder = MessageDecoder::new(None);
    let decoded = decoder.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded, msg);
    assert!(buf.is_empty());
}

#[test]
fn test_back_to_back_messages() {
    let mut buf = BytesMut::new();
    for body in ["one", "", "three"] {
        encode_message(&Message::new(body), &mut buf);
    }

    let mut decoder = MessageDecoder::new(Some(1024));
    let mut bodies = Vec::new();
    while let Some(msg) = decoder.decode(&mut buf).unwrap() {
        bodies.push(msg.body().clone());
    }
    assert_eq!(bodies, vec!["one", "", "three"]);
}

#[test]
fn test_split_delivery() {
    let mut wire = BytesMut::new();
    encode_message(&Message::new("split across reads"), &mut wire);
    let wire = wire.freeze();

    let mut decoder = MessageDecoder::new(None);
    let mut buf = BytesMut::new();
    let (head, tail) = wire.split_at(13);
    buf.extend_from_slice(head);
    assert!(decoder.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(tail);
    let msg = decoder.decode(&mut buf).unwrap().unwrap();
    assert_eq!(msg.body(), "split across reads");
}

#[test]
fn test_oversized_body_is_rejected() {
    let mut buf = BytesMut::new();
    encode_message(&Message::new(vec![0u8; 64]), &mut buf);

    let mut decoder = MessageDecoder::new(Some(32));
    assert_eq!(
        decoder.decode(&mut buf).unwrap_err(),
        CodecError::TooLarge { size: 64, max: 32 }
    );
}
