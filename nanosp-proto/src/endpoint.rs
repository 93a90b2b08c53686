//! Endpoints owned by one socket.
//!
//! Ids are handed out in increasing order and never reused within a
//! socket, so a shut down id stays `NotFound` forever.

use std::fmt;

use nanosp_core::error::{Result, SpError};
use nanosp_core::transport::{Endpoint, EndpointRole, EndpointState};

/// Identifier of a bind or connect, unique within its socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u32);

impl EndpointId {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Snapshot of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: EndpointId,
    pub address: String,
    pub role: EndpointRole,
    pub state: EndpointState,
}

#[derive(Debug)]
pub(crate) struct EndpointTable {
    next: u32,
    entries: Vec<(EndpointId, Endpoint)>,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            next: 1,
            entries: Vec::new(),
        }
    }
}

impl EndpointTable {
    pub(crate) fn insert(&mut self, endpoint: Endpoint) -> EndpointId {
        let id = EndpointId(self.next);
        self.next = self.next.wrapping_add(1).max(1);
        self.entries.push((id, endpoint));
        id
    }

    pub(crate) fn remove(&mut self, id: EndpointId) -> Result<Endpoint> {
        let pos = self
            .entries
            .iter()
            .position(|(eid, _)| *eid == id)
            .ok_or_else(|| SpError::not_found(format!("endpoint {id}")))?;
        Ok(self.entries.remove(pos).1)
    }

    pub(crate) fn drain(&mut self) -> Vec<Endpoint> {
        self.entries.drain(..).map(|(_, ep)| ep).collect()
    }

    /// Whether any connect endpoint is still running.
    pub(crate) fn has_connect(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, ep)| ep.role() == EndpointRole::Connect)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn list(&self) -> Vec<EndpointInfo> {
        self.entries
            .iter()
            .map(|(id, ep)| EndpointInfo {
                id: *id,
                address: ep.address().to_string(),
                role: ep.role(),
                state: ep.state(),
            })
            .collect()
    }
}
