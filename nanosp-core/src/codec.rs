//! SP wire framing.
//!
//! Every frame is an 8-byte big-endian length followed by that many payload
//! bytes. A message travels as two frames: its ancillary chain, then its
//! body.
//!
//! Ancillary chain layout, one entry after another:
//!
//! ```text
//! +-----------+-----------+----------------+----------+---------+
//! | level i32 | type i32  | length u64     | data     | padding |
//! +-----------+-----------+----------------+----------+---------+
//!   `length` = 16 + data.len(); the entry spans align(length) bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::message::{Ancillary, Message};

/// Width of the frame length prefix.
pub const LENGTH_PREFIX: usize = 8;

/// Alignment of ancillary entries.
pub const ALIGN: usize = 8;

/// Encoded size of one ancillary header (level, type, length).
pub const ANC_HEADER_LEN: usize = 16;

/// Default receive limit for a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME: u64 = 1024 * 1024;

/// Framing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame of {size} bytes exceeds limit of {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Ancillary entry length {declared} is shorter than its header")]
    ShortEntry { declared: u64 },

    #[error("Ancillary entry of {declared} bytes overruns the remaining {remaining}")]
    ChainOverrun { declared: u64, remaining: usize },

    #[error("Truncated ancillary header: {remaining} bytes left")]
    TruncatedHeader { remaining: usize },
}

/// Round `len` up to the ancillary alignment.
#[inline]
#[must_use]
pub const fn align(len: usize) -> usize {
    (len + ALIGN - 1) & !(ALIGN - 1)
}

/// Value stored in an entry's length field for `data_len` payload bytes.
#[inline]
#[must_use]
pub const fn entry_len(data_len: usize) -> usize {
    ANC_HEADER_LEN + data_len
}

/// Bytes an entry occupies in the chain, padding included.
#[inline]
#[must_use]
pub const fn entry_space(data_len: usize) -> usize {
    align(entry_len(data_len))
}

/// Total encoded size of an ancillary chain.
#[must_use]
pub fn chain_len(entries: &[Ancillary]) -> usize {
    entries.iter().map(|e| entry_space(e.data.len())).sum()
}

/// Encode an ancillary chain (without the outer length prefix).
pub fn encode_ancillary(entries: &[Ancillary], dst: &mut BytesMut) {
    dst.reserve(chain_len(entries));
    for entry in entries {
        let len = entry_len(entry.data.len());
        dst.put_i32(entry.level);
        dst.put_i32(entry.kind);
        dst.put_u64(len as u64);
        dst.put_slice(&entry.data);
        dst.put_bytes(0, align(len) - len);
    }
}

/// Decode an ancillary chain spanning exactly `src`.
pub fn decode_ancillary(mut src: Bytes) -> Result<Vec<Ancillary>, CodecError> {
    let mut out = Vec::new();
    while src.has_remaining() {
        let remaining = src.len();
        if remaining < ANC_HEADER_LEN {
            return Err(CodecError::TruncatedHeader { remaining });
        }
        let mut header = &src[..ANC_HEADER_LEN];
        let level = header.get_i32();
        let kind = header.get_i32();
        let declared = header.get_u64();

        if declared < ANC_HEADER_LEN as u64 {
            return Err(CodecError::ShortEntry { declared });
        }
        if declared > remaining as u64 || align(declared as usize) > remaining {
            return Err(CodecError::ChainOverrun {
                declared,
                remaining,
            });
        }

        let len = declared as usize;
        let mut entry = src.split_to(align(len));
        entry.advance(ANC_HEADER_LEN);
        entry.truncate(len - ANC_HEADER_LEN);
        out.push(Ancillary {
            level,
            kind,
            data: entry,
        });
    }
    Ok(out)
}

/// Encode one length-prefixed frame.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(LENGTH_PREFIX + payload.len());
    dst.put_u64(payload.len() as u64);
    dst.put_slice(payload);
}

/// Encoded size of a message on the wire, both length prefixes included.
#[must_use]
pub fn wire_len(msg: &Message) -> usize {
    2 * LENGTH_PREFIX + chain_len(msg.ancillary()) + msg.len()
}

/// Encode a full message: ancillary chain frame, then body frame.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    let chain = chain_len(msg.ancillary());
    dst.reserve(2 * LENGTH_PREFIX + chain + msg.len());
    dst.put_u64(chain as u64);
    encode_ancillary(msg.ancillary(), dst);
    encode_frame(msg.body(), dst);
}

/// Stateful frame decoder.
///
/// Bytes accumulate in the caller's `BytesMut`; a frame is split off as
/// soon as it is complete. The declared length is checked against the
/// limit before any payload is buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    max_size: Option<u64>,
    expected: Option<usize>,
}

impl FrameDecoder {
    /// `max_size` of `None` disables the limit.
    #[must_use]
    pub const fn new(max_size: Option<u64>) -> Self {
        Self {
            max_size,
            expected: None,
        }
    }

    /// Decode a single frame from `src`
    ///
    /// Returns:
    /// - Ok(Some(payload)) → frame decoded
    /// - Ok(None) → need more data
    /// - Err → length exceeds the limit
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        let body_len = match self.expected {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX {
                    return Ok(None);
                }
                let size = src.get_u64();
                if let Some(max) = self.max_size {
                    if size > max {
                        return Err(CodecError::TooLarge { size, max });
                    }
                }
                let len = usize::try_from(size).map_err(|_| CodecError::TooLarge {
                    size,
                    max: usize::MAX as u64,
                })?;
                self.expected = Some(len);
                len
            }
        };

        if src.len() < body_len {
            src.reserve(body_len - src.len());
            return Ok(None);
        }

        self.expected = None;
        Ok(Some(src.split_to(body_len).freeze()))
    }
}

/// Decoder for whole messages (chain frame + body frame).
#[derive(Debug)]
pub struct MessageDecoder {
    frames: FrameDecoder,
    chain: Option<Vec<Ancillary>>,
}

impl MessageDecoder {
    #[must_use]
    pub const fn new(max_size: Option<u64>) -> Self {
        Self {
            frames: FrameDecoder::new(max_size),
            chain: None,
        }
    }

    /// Decode one message, `Ok(None)` when more bytes are needed.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            let Some(frame) = self.frames.decode(src)? else {
                return Ok(None);
            };
            match self.chain.take() {
                None => self.chain = Some(decode_ancillary(frame)?),
                Some(chain) => return Ok(Some(Message::from_parts(frame, chain))),
            }
        }
    }
}
