//! Transports: inproc, IPC and TCP.
//!
//! A transport turns an [`Address`] into an [`Endpoint`] and, for every
//! established connection, hands a [`Pipe`] to the owning socket through the
//! [`PipeHost`] trait. Inbound messages are pushed into the host with
//! [`PipeHost::deliver`]; outbound messages are queued on the pipe and
//! written by a per-connection writer thread.
//!
//! ```text
//!            attach(Pipe)            deliver(id, msg)
//!  socket <-------------- transport <---------------- reader thread
//!    |                                                   ^
//!    | pipe.try_send(msg)                                | bytes
//!    v                                                   |
//!  flume queue ---------> writer thread ----------> stream / peer
//! ```

pub mod handshake;
pub mod inproc;
#[cfg(unix)]
pub mod ipc;
pub mod stream;
pub mod tcp;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use tracing::debug;

use crate::address::{Address, TransportKind};
use crate::codec::wire_len;
use crate::config::TransportConfig;
use crate::error::Result;
use crate::message::Message;
use crate::options::SocketOptions;
use crate::protocol::Protocol;
use crate::stats::Stats;

use self::stream::NetStream;

/// Identifier of one connection, unique for the life of the process.
pub type PipeId = u64;

static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh pipe id.
pub fn next_pipe_id() -> PipeId {
    NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// The socket side of the transport seam.
///
/// Implemented by the socket core. Every method may be called from transport
/// threads concurrently with user calls.
pub trait PipeHost: Send + Sync + 'static {
    /// Protocol of the local socket, announced in the handshake.
    fn protocol(&self) -> Protocol;

    /// Snapshot of the current options.
    fn options(&self) -> SocketOptions;

    /// Short label for log lines.
    fn label(&self) -> String;

    fn stats(&self) -> &Stats;

    /// Offer a newly established pipe. Returns `false` if the socket refuses
    /// it (closed, or a single-peer protocol that already has a peer); the
    /// pipe is dropped in that case.
    fn attach(&self, pipe: Pipe) -> bool;

    /// Hand an inbound message to the socket, blocking while its receive
    /// queue is full. Returns `false` once the pipe is gone or the socket is
    /// closed; the caller must stop reading.
    fn deliver(&self, pipe: PipeId, msg: Message) -> bool;

    /// Remove a pipe after its connection ended. Idempotent.
    fn detach(&self, pipe: PipeId);

    /// An outbound queue shrank.
    fn on_writable(&self);
}

/// Outbound side of one established connection.
///
/// Owned by the socket core. Dropping it closes the connection.
#[derive(Debug)]
pub struct Pipe {
    id: PipeId,
    peer: Protocol,
    transport: TransportKind,
    priority: u8,
    tx: flume::Sender<Message>,
    queued: Arc<AtomicUsize>,
    budget: usize,
    stream: Option<NetStream>,
}

impl Pipe {
    pub(crate) fn new(
        id: PipeId,
        peer: Protocol,
        transport: TransportKind,
        options: &SocketOptions,
        tx: flume::Sender<Message>,
        queued: Arc<AtomicUsize>,
        stream: Option<NetStream>,
    ) -> Self {
        Self {
            id,
            peer,
            transport,
            priority: options.send_priority,
            tx,
            queued,
            budget: options.send_buffer,
            stream,
        }
    }

    /// A pipe with no transport behind it. Messages queued on it appear on
    /// the returned receiver and stay accounted as queued.
    pub fn unbound(peer: Protocol, options: &SocketOptions) -> (Self, flume::Receiver<Message>) {
        let (tx, rx) = flume::unbounded();
        let pipe = Self::new(
            next_pipe_id(),
            peer,
            TransportKind::Inproc,
            options,
            tx,
            Arc::new(AtomicUsize::new(0)),
            None,
        );
        (pipe, rx)
    }

    #[inline]
    pub fn id(&self) -> PipeId {
        self.id
    }

    #[inline]
    pub fn peer(&self) -> Protocol {
        self.peer
    }

    #[inline]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Outbound priority; lower is preferred.
    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Bytes queued but not yet written.
    pub fn queued_bytes(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// A pipe accepts a message while its queue is below SNDBUF. An empty
    /// queue always accepts, so oversized messages still make progress.
    pub fn is_writable(&self) -> bool {
        let queued = self.queued_bytes();
        queued == 0 || queued < self.budget
    }

    /// Queue a message without blocking; hands it back if the queue is full
    /// or the connection is gone.
    pub fn try_send(&self, msg: Message) -> std::result::Result<(), Message> {
        if !self.is_writable() {
            return Err(msg);
        }
        let cost = wire_len(&msg);
        self.queued.fetch_add(cost, Ordering::AcqRel);
        self.tx.send(msg).map_err(|e| {
            self.queued.fetch_sub(cost, Ordering::AcqRel);
            e.into_inner()
        })
    }

    /// Whether the draining thread has exited.
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_disconnected()
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.shutdown();
        }
    }
}

/// Direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Bind,
    Connect,
}

/// Observable state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Listening without a peer yet, or dialing
    Pending,
    /// Has (or, for a bind, has had) a connection
    Active,
}

/// Connection counter shared between an endpoint and its transport threads.
#[derive(Debug, Default)]
pub(crate) struct Liveness {
    live: AtomicUsize,
    established: AtomicBool,
}

impl Liveness {
    pub(crate) fn up(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.established.store(true, Ordering::Release);
    }

    pub(crate) fn down(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// A running bind or connect.
///
/// Shutting the endpoint down stops its threads and closes every
/// connection it created.
pub struct Endpoint {
    address: Address,
    role: EndpointRole,
    stop: Option<flume::Sender<()>>,
    acceptor: Option<JoinHandle<()>>,
    connections: stream::ConnectionSet,
    liveness: Arc<Liveness>,
    on_shutdown: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    pub(crate) fn new(address: Address, role: EndpointRole) -> Self {
        let connections = stream::ConnectionSet::default();
        let liveness = connections.liveness();
        Self {
            address,
            role,
            stop: None,
            acceptor: None,
            connections,
            liveness,
            on_shutdown: None,
        }
    }

    #[inline]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[inline]
    pub fn role(&self) -> EndpointRole {
        self.role
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.liveness.live.load(Ordering::Acquire)
    }

    pub fn state(&self) -> EndpointState {
        let active = match self.role {
            EndpointRole::Bind => self.liveness.established.load(Ordering::Acquire),
            EndpointRole::Connect => self.connection_count() > 0,
        };
        if active {
            EndpointState::Active
        } else {
            EndpointState::Pending
        }
    }

    /// Stop the endpoint.
    ///
    /// Must not be called while holding the host's lock: the acceptor
    /// thread is joined and may be attaching a pipe.
    pub fn shutdown(mut self) {
        debug!("[{}] shutting down {:?} endpoint", self.address, self.role);
        drop(self.stop.take());
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
        self.connections.shutdown_all();
        if let Some(hook) = self.on_shutdown.take() {
            hook();
        }
    }
}

/// Start listening on `address`.
pub fn bind(
    host: &Arc<dyn PipeHost>,
    address: &Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    match address {
        Address::Inproc(name) => inproc::bind(host, name, address.clone()),
        Address::Tcp { .. } => tcp::bind(host, address, config),
        #[cfg(unix)]
        Address::Ipc(path) => ipc::bind(host, path, address.clone(), config),
        #[cfg(not(unix))]
        Address::Ipc(_) => Err(crate::address::AddressError::IpcNotSupported.into()),
    }
}

/// Start dialing `address`. Never fails for reachability reasons: the
/// endpoint keeps retrying in the background.
pub fn connect(
    host: &Arc<dyn PipeHost>,
    address: &Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    match address {
        Address::Inproc(name) => Ok(inproc::connect(host, name, address.clone())),
        Address::Tcp { .. } | Address::Ipc(_) => {
            stream::spawn_dialer(host, address.clone(), config)
        }
    }
}

pub(crate) fn weak(host: &Arc<dyn PipeHost>) -> Weak<dyn PipeHost> {
    Arc::downgrade(host)
}
