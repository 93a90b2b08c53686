//! User-facing SP socket.
//!
//! A [`Socket`] owns one slot of the handle table and the shared core that
//! transports deliver into. Every method can be called from any thread;
//! concurrent sends (and concurrent receives) are serialized by the core.
//!
//! # Example
//!
//! ```no_run
//! use nanosp_core::protocol::{Domain, Protocol};
//! use nanosp_proto::Socket;
//!
//! let rep = Socket::open(Domain::Sp, Protocol::Rep)?;
//! rep.bind("tcp://127.0.0.1:5555")?;
//! let request = rep.recv(0)?;
//! rep.send(request, 0)?;
//! # Ok::<(), nanosp_core::error::SpError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use nanosp_core::error::Result;
use nanosp_core::message::Message;
use nanosp_core::options::{OptionValue, SocketOptions};
use nanosp_core::protocol::{Domain, Protocol};
use nanosp_core::stats::Statistic;
use nanosp_core::symbols::DONTWAIT;
use nanosp_core::transport::EndpointRole;

use crate::core::{Readiness, SocketCore};
use crate::endpoint::{EndpointId, EndpointInfo};
use crate::registry::{self, SocketHandle};

/// An SP socket.
pub struct Socket {
    core: Arc<SocketCore>,
    handle: SocketHandle,
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("handle", &self.handle)
            .field("domain", &self.core.domain())
            .field("protocol", &self.core.protocol_kind())
            .finish()
    }
}

impl Socket {
    /// Open a socket with default options.
    pub fn open(domain: Domain, protocol: Protocol) -> Result<Self> {
        Self::with_options(domain, protocol, SocketOptions::default())
    }

    /// Open a socket from numeric domain and protocol values.
    ///
    /// Unknown protocols fail `UnsupportedProtocol`, unknown domains
    /// `InvalidArgument`.
    pub fn open_raw(domain: i32, protocol: i32) -> Result<Self> {
        let protocol = Protocol::from_raw(protocol)?;
        let domain = Domain::from_raw(domain)?;
        Self::open(domain, protocol)
    }

    pub fn with_options(
        domain: Domain,
        protocol: Protocol,
        options: SocketOptions,
    ) -> Result<Self> {
        let handle = registry::allocate()?;
        debug!("[{protocol}] opened socket {handle} ({domain:?})");
        Ok(Self {
            core: Arc::new(SocketCore::new(domain, protocol, options)),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    #[inline]
    pub fn domain(&self) -> Domain {
        self.core.domain()
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.core.protocol_kind()
    }

    pub(crate) fn core(&self) -> &Arc<SocketCore> {
        &self.core
    }

    /// Close the socket.
    ///
    /// Waits up to `LINGER` for queued outbound messages, then releases
    /// every endpoint. Blocked calls on other threads fail `Closed`. A
    /// second close fails `InvalidState`.
    pub fn close(&self) -> Result<()> {
        self.core.close()?;
        registry::release(self.handle)
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Listen on `address`.
    pub fn bind(&self, address: &str) -> Result<EndpointId> {
        self.core.add_endpoint(address, EndpointRole::Bind)
    }

    /// Connect to `address`. Returns once the endpoint is registered; the
    /// connection itself is established (and re-established) in the
    /// background.
    pub fn connect(&self, address: &str) -> Result<EndpointId> {
        self.core.add_endpoint(address, EndpointRole::Connect)
    }

    /// Remove one endpoint and close its connections.
    pub fn shutdown(&self, endpoint: EndpointId) -> Result<()> {
        self.core.shutdown_endpoint(endpoint)
    }

    /// Send a message body. Returns the number of body bytes sent.
    pub fn send(&self, body: impl Into<Bytes>, flags: i32) -> Result<usize> {
        self.send_msg(Message::new(body), flags)
    }

    /// Receive a message body.
    pub fn recv(&self, flags: i32) -> Result<Bytes> {
        self.recv_msg(flags).map(|msg| msg.into_parts().0)
    }

    /// Send a message with its ancillary data.
    pub fn send_msg(&self, msg: Message, flags: i32) -> Result<usize> {
        self.core.send_msg(msg, flags & DONTWAIT != 0)
    }

    /// Receive a message with its ancillary data. Raw sockets expose the
    /// protocol header as an SP header entry.
    pub fn recv_msg(&self, flags: i32) -> Result<Message> {
        self.core.recv_msg(flags & DONTWAIT != 0)
    }

    pub fn get_option(&self, level: i32, name: i32) -> Result<OptionValue> {
        self.core.get_option(level, name)
    }

    pub fn set_option(&self, level: i32, name: i32, value: impl Into<OptionValue>) -> Result<()> {
        self.core.set_option(level, name, value.into())
    }

    pub fn get_statistic(&self, stat: Statistic) -> u64 {
        self.core.statistic(stat)
    }

    /// Current readiness without blocking.
    pub fn events(&self) -> Result<Readiness> {
        self.core.readiness().map(|(readiness, _)| readiness)
    }

    pub fn endpoints(&self) -> Result<Vec<EndpointInfo>> {
        self.core.endpoints()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if !self.core.is_closed() {
            let _ = self.close();
        }
    }
}
