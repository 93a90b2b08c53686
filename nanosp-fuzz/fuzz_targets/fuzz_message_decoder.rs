#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use nanosp_core::codec::{encode_message, MessageDecoder};

// Cap frames so a hostile length prefix cannot request a huge buffer.
const MAX_FRAME: u64 = 1 << 20;

fuzz_target!(|data: &[u8]| {
    // Feed the input in two chunks to exercise partial frames.
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let mut decoder = MessageDecoder::new(Some(MAX_FRAME));
    let mut src = BytesMut::from(&data[..split]);

    let mut decoded = Vec::new();
    for chunk in [&data[split..], &[][..]] {
        loop {
            match decoder.decode(&mut src) {
                Ok(Some(msg)) => decoded.push(msg),
                Ok(None) => break,
                Err(_) => return,
            }
        }
        src.extend_from_slice(chunk);
    }

    // Whatever decodes must re-encode to something that decodes the same.
    for msg in decoded {
        let mut wire = BytesMut::new();
        encode_message(&msg, &mut wire);
        let mut again = MessageDecoder::new(None);
        assert_eq!(again.decode(&mut wire).ok().flatten(), Some(msg));
        assert!(wire.is_empty());
    }
});
