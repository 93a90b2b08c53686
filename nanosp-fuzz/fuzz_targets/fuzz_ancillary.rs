#![no_main]

use bytes::{Bytes, BytesMut};
use libfuzzer_sys::fuzz_target;
use nanosp_core::codec::{chain_len, decode_ancillary, encode_ancillary};

fuzz_target!(|data: &[u8]| {
    let Ok(entries) = decode_ancillary(Bytes::copy_from_slice(data)) else {
        return;
    };
    let mut wire = BytesMut::new();
    encode_ancillary(&entries, &mut wire);
    assert_eq!(wire.len(), chain_len(&entries));
    assert_eq!(decode_ancillary(wire.freeze()).ok(), Some(entries));
});
