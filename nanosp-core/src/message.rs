//! SP message: a body plus an ordered chain of ancillary entries.
//!
//! Ancillary entries model out-of-band metadata such as the protocol
//! header that carries request ids and the pipe backtrace.

use bytes::Bytes;

use crate::symbols::{PROTO_SP, SP_HDR};

/// One ancillary-data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancillary {
    pub level: i32,
    pub kind: i32,
    pub data: Bytes,
}

impl Ancillary {
    #[must_use]
    pub fn new(level: i32, kind: i32, data: impl Into<Bytes>) -> Self {
        Self {
            level,
            kind,
            data: data.into(),
        }
    }

    /// Protocol header entry (`PROTO_SP` / `SP_HDR`).
    #[must_use]
    pub fn sp_header(data: impl Into<Bytes>) -> Self {
        Self::new(PROTO_SP, SP_HDR, data)
    }

    #[inline]
    #[must_use]
    pub fn is_sp_header(&self) -> bool {
        self.level == PROTO_SP && self.kind == SP_HDR
    }
}

/// A message with optional ancillary data.
///
/// # Examples
///
/// ```
/// use nanosp_core::message::{Ancillary, Message};
///
/// let msg = Message::new("payload").with_ancillary(Ancillary::new(7, 1, "meta"));
/// assert_eq!(msg.body(), &b"payload"[..]);
/// assert_eq!(msg.ancillary().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    body: Bytes,
    ancillary: Vec<Ancillary>,
}

impl Message {
    /// Create a message without ancillary data.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ancillary: Vec::new(),
        }
    }

    /// Create a message from a body and an ancillary chain.
    #[must_use]
    pub fn from_parts(body: impl Into<Bytes>, ancillary: Vec<Ancillary>) -> Self {
        Self {
            body: body.into(),
            ancillary,
        }
    }

    /// Append an ancillary entry.
    #[must_use]
    pub fn with_ancillary(mut self, entry: Ancillary) -> Self {
        self.ancillary.push(entry);
        self
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn ancillary(&self) -> &[Ancillary] {
        &self.ancillary
    }

    /// Body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Split into body and ancillary chain.
    #[must_use]
    pub fn into_parts(self) -> (Bytes, Vec<Ancillary>) {
        (self.body, self.ancillary)
    }

    /// Remove and return the protocol header entry, if any.
    pub fn take_sp_header(&mut self) -> Option<Bytes> {
        let pos = self.ancillary.iter().position(Ancillary::is_sp_header)?;
        Some(self.ancillary.remove(pos).data)
    }

    /// Replace (or insert) the protocol header entry; it is kept first.
    pub fn set_sp_header(&mut self, header: Bytes) {
        self.ancillary.retain(|a| !a.is_sp_header());
        self.ancillary.insert(0, Ancillary::sp_header(header));
    }

    /// Borrow the protocol header entry, if any.
    #[must_use]
    pub fn sp_header(&self) -> Option<&Bytes> {
        self.ancillary
            .iter()
            .find(|a| a.is_sp_header())
            .map(|a| &a.data)
    }
}

impl From<Bytes> for Message {
    fn from(body: Bytes) -> Self {
        Self::new(body)
    }
}

impl From<Vec<u8>> for Message {
    fn from(body: Vec<u8>) -> Self {
        Self::new(body)
    }
}

impl From<&'static [u8]> for Message {
    fn from(body: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(body))
    }
}

impl From<&'static str> for Message {
    fn from(body: &'static str) -> Self {
        Self::new(Bytes::from_static(body.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_message() {
        let msg = Message::new(&b"hello"[..]);
        assert_eq!(msg.len(), 5);
        assert!(msg.ancillary().is_empty());
        assert!(Message::new(Bytes::new()).is_empty());
    }

    #[test]
    fn test_sp_header_replace_and_take() {
        let mut msg = Message::new("x").with_ancillary(Ancillary::new(9, 9, "user"));
        msg.set_sp_header(Bytes::from_static(&[0, 0, 0, 1]));
        msg.set_sp_header(Bytes::from_static(&[0, 0, 0, 2]));

        assert_eq!(msg.ancillary().len(), 2);
        assert!(msg.ancillary()[0].is_sp_header());
        assert_eq!(msg.sp_header().unwrap().as_ref(), &[0, 0, 0, 2]);

        let header = msg.take_sp_header().unwrap();
        assert_eq!(header.as_ref(), &[0, 0, 0, 2]);
        assert!(msg.take_sp_header().is_none());
        assert_eq!(msg.ancillary(), &[Ancillary::new(9, 9, "user")]);
    }

    #[test]
    fn test_into_parts() {
        let msg = Message::from_parts("body", vec![Ancillary::new(1, 2, "a")]);
        let (body, anc) = msg.into_parts();
        assert_eq!(body, "body");
        assert_eq!(anc.len(), 1);
    }
}
