//! Connection header exchange.
//!
//! Both sides send eight bytes immediately after the connection is
//! established and read the peer's eight:
//!
//! ```text
//! +------+------+------+------+-------------+-------------+
//! | 0x00 | 'S'  | 'P'  | 0x00 | protocol BE | reserved BE |
//! +------+------+------+------+-------------+-------------+
//! ```
//!
//! The connection is dropped if the signature is wrong or the peer's
//! protocol is not the local protocol's counterpart.

use std::io::{Read, Write};
use std::time::Duration;

use thiserror::Error;

use crate::protocol::Protocol;

use super::stream::NetStream;

/// Length of the connection header.
pub const HEADER_LEN: usize = 8;

const SIGNATURE: [u8; 4] = [0x00, b'S', b'P', 0x00];

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("invalid protocol header signature {0:02x?}")]
    BadSignature([u8; 4]),

    #[error("unknown peer protocol {0}")]
    UnknownProtocol(u16),

    #[error("{local} cannot talk to {peer}")]
    Incompatible { local: Protocol, peer: Protocol },

    #[error("handshake I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode the header announcing `protocol`.
#[must_use]
pub fn encode_header(protocol: Protocol) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[..4].copy_from_slice(&SIGNATURE);
    out[4..6].copy_from_slice(&(protocol as u16).to_be_bytes());
    out
}

/// Parse a peer header and check it against the local protocol.
pub fn check_header(
    local: Protocol,
    header: &[u8; HEADER_LEN],
) -> Result<Protocol, HandshakeError> {
    let mut signature = [0u8; 4];
    signature.copy_from_slice(&header[..4]);
    if signature != SIGNATURE {
        return Err(HandshakeError::BadSignature(signature));
    }
    let raw = u16::from_be_bytes([header[4], header[5]]);
    let peer =
        Protocol::from_raw(i32::from(raw)).map_err(|_| HandshakeError::UnknownProtocol(raw))?;
    if !local.is_compatible(peer) {
        return Err(HandshakeError::Incompatible { local, peer });
    }
    Ok(peer)
}

/// Exchange headers on a freshly established stream.
///
/// The read side is bounded by `timeout`; the timeout is cleared again on
/// success.
pub fn exchange(
    stream: &mut NetStream,
    local: Protocol,
    timeout: Duration,
) -> Result<Protocol, HandshakeError> {
    stream.set_read_timeout(Some(timeout))?;
    stream.write_all(&encode_header(local))?;
    stream.flush()?;

    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header)?;
    let peer = check_header(local, &header)?;

    stream.set_read_timeout(None)?;
    Ok(peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = encode_header(Protocol::Req);
        assert_eq!(header, [0x00, b'S', b'P', 0x00, 0x00, 48, 0x00, 0x00]);
    }

    #[test]
    fn test_compatible_header() {
        let header = encode_header(Protocol::Rep);
        assert_eq!(check_header(Protocol::Req, &header).unwrap(), Protocol::Rep);
    }

    #[test]
    fn test_incompatible_header() {
        let header = encode_header(Protocol::Pub);
        assert!(matches!(
            check_header(Protocol::Req, &header),
            Err(HandshakeError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_bad_signature() {
        let mut header = encode_header(Protocol::Pair);
        header[1] = b'X';
        assert!(matches!(
            check_header(Protocol::Pair, &header),
            Err(HandshakeError::BadSignature(_))
        ));
    }

    #[test]
    fn test_unknown_protocol() {
        let mut header = encode_header(Protocol::Pair);
        header[5] = 0xff;
        assert!(matches!(
            check_header(Protocol::Pair, &header),
            Err(HandshakeError::UnknownProtocol(0xff))
        ));
    }
}
