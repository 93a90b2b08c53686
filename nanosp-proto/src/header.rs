//! SP header: the backtrace stack carried by request/reply and survey.
//!
//! The header is a sequence of big-endian `u32` words. Each hop a message
//! passes through pushes the id of the pipe it arrived on; the originator's
//! request (or survey) id terminates the stack and is the only word with the
//! top bit set.
//!
//! ```text
//! [hop_n] ... [hop_1] [0x80000000 | request_id]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;
use thiserror::Error;

use nanosp_core::transport::PipeId;

/// Marks the terminating id word.
pub const ID_FLAG: u32 = 0x8000_0000;

pub type Words = SmallVec<[u32; 4]>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("header has no terminating id")]
    Unterminated,

    #[error("backtrace of {hops} hops exceeds the limit of {max}")]
    TooManyHops { hops: usize, max: u8 },
}

/// Hop word identifying a pipe of this socket.
#[inline]
#[must_use]
pub fn hop(pipe: PipeId) -> u32 {
    (pipe as u32) & !ID_FLAG
}

/// Pipe id addressed by a hop word.
#[inline]
#[must_use]
pub fn pipe_of(hop: u32) -> PipeId {
    PipeId::from(hop & !ID_FLAG)
}

/// Parse a header into its words.
pub fn decode(header: &[u8]) -> Result<Words, HeaderError> {
    if header.len() % 4 != 0 {
        return Err(HeaderError::Misaligned(header.len()));
    }
    Ok(header
        .chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

pub fn encode(words: &[u32]) -> Bytes {
    let mut out = BytesMut::with_capacity(words.len() * 4);
    for word in words {
        out.put_u32(*word);
    }
    out.freeze()
}

/// Header holding only an originator id.
#[must_use]
pub fn id_only(id: u32) -> Bytes {
    encode(&[id | ID_FLAG])
}

/// Parse a header expected to hold only an originator id.
#[must_use]
pub fn parse_id_only(header: &[u8]) -> Option<u32> {
    let words = decode(header).ok()?;
    match words.as_slice() {
        [id] if id & ID_FLAG != 0 => Some(*id),
        _ => None,
    }
}

/// Push the arrival pipe onto an inbound backtrace.
///
/// The stack must be terminated by an id word. A request that came straight
/// from its originator is hop 1; each device in between adds one, and the
/// count may not exceed `max_ttl`.
pub fn push_hop(header: Option<&Bytes>, pipe: PipeId, max_ttl: u8) -> Result<Bytes, HeaderError> {
    let existing = match header {
        Some(h) => decode(h)?,
        None => Words::new(),
    };
    let Some(end) = existing.iter().position(|w| w & ID_FLAG != 0) else {
        return Err(HeaderError::Unterminated);
    };
    let hops = end + 1;
    if hops > usize::from(max_ttl) {
        return Err(HeaderError::TooManyHops { hops, max: max_ttl });
    }

    let mut words = Words::with_capacity(end + 2);
    words.push(hop(pipe));
    words.extend_from_slice(&existing[..=end]);
    Ok(encode(&words))
}

/// Split the first hop off an outbound backtrace.
#[must_use]
pub fn pop_hop(header: &[u8]) -> Option<(PipeId, Bytes)> {
    let words = decode(header).ok()?;
    let (first, rest) = words.split_first()?;
    if first & ID_FLAG != 0 {
        return None;
    }
    Some((pipe_of(*first), encode(rest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_only() {
        let header = id_only(7);
        assert_eq!(&header[..], &[0x80, 0, 0, 7]);
        assert_eq!(parse_id_only(&header), Some(0x8000_0007));
        assert_eq!(parse_id_only(&encode(&[1, ID_FLAG | 7])), None);
    }

    #[test]
    fn test_push_and_pop() {
        let header = id_only(42);
        let pushed = push_hop(Some(&header), 5, 8).unwrap();
        assert_eq!(decode(&pushed).unwrap().as_slice(), &[5, ID_FLAG | 42]);

        let (pipe, rest) = pop_hop(&pushed).unwrap();
        assert_eq!(pipe, 5);
        assert_eq!(rest, header);
    }

    #[test]
    fn test_unterminated_rejected() {
        let header = encode(&[1, 2]);
        assert_eq!(push_hop(Some(&header), 3, 8), Err(HeaderError::Unterminated));
        assert_eq!(push_hop(None, 3, 8), Err(HeaderError::Unterminated));
    }

    #[test]
    fn test_ttl_limit() {
        let header = encode(&[1, 2, ID_FLAG | 9]);
        assert!(push_hop(Some(&header), 4, 3).is_ok());
        assert_eq!(
            push_hop(Some(&header), 4, 2),
            Err(HeaderError::TooManyHops { hops: 3, max: 2 })
        );
    }

    #[test]
    fn test_direct_request_is_one_hop() {
        let header = id_only(5);
        let pushed = push_hop(Some(&header), 1, 1).unwrap();
        assert_eq!(decode(&pushed).unwrap().as_slice(), &[1, ID_FLAG | 5]);

        let relayed = encode(&[3, ID_FLAG | 5]);
        assert_eq!(
            push_hop(Some(&relayed), 1, 1),
            Err(HeaderError::TooManyHops { hops: 2, max: 1 })
        );
    }

    #[test]
    fn test_words_after_id_are_discarded() {
        let header = encode(&[ID_FLAG | 1, 77]);
        let pushed = push_hop(Some(&header), 2, 8).unwrap();
        assert_eq!(decode(&pushed).unwrap().as_slice(), &[2, ID_FLAG | 1]);
    }

    #[test]
    fn test_misaligned() {
        assert_eq!(decode(&[0, 1, 2]), Err(HeaderError::Misaligned(3)));
        assert_eq!(pop_hop(&id_only(3)), None);
    }
}
