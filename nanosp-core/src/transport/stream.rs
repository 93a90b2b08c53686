//! Byte-stream transports (TCP and IPC).
//!
//! Each endpoint runs on its own thread: dialers connect, retry with
//! backoff and run the connection's reader inline; acceptors poll a
//! nonblocking listener and spawn one reader thread per connection. Every
//! connection additionally gets a writer thread draining its pipe queue.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

use bytes::BytesMut;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::address::{Address, TransportKind};
use crate::codec::{encode_message, wire_len, CodecError, MessageDecoder};
use crate::config::TransportConfig;
use crate::error::Result;
use crate::message::Message;
use crate::options::SocketOptions;
use crate::reconnect::ReconnectState;
use crate::stats::Statistic;

use super::handshake::{self, HandshakeError};
use super::{next_pipe_id, weak, Endpoint, EndpointRole, Liveness, Pipe, PipeHost, PipeId};

/// A connected byte stream.
#[derive(Debug)]
pub enum NetStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Ipc(UnixStream),
}

impl NetStream {
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(s) => s.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Ipc(s) => s.try_clone().map(Self::Ipc),
        }
    }

    /// Shut both directions down, waking any blocked reader or writer.
    pub fn shutdown(&self) {
        let _ = match self {
            Self::Tcp(s) => s.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Ipc(s) => s.shutdown(Shutdown::Both),
        };
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Ipc(s) => s.set_read_timeout(timeout),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Ipc(s) => s.set_nonblocking(nonblocking),
        }
    }

    fn transport(&self) -> TransportKind {
        match self {
            Self::Tcp(_) => TransportKind::Tcp,
            #[cfg(unix)]
            Self::Ipc(_) => TransportKind::Ipc,
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Self::Ipc(s) => s.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Self::Ipc(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Self::Ipc(s) => s.flush(),
        }
    }
}

/// A bound listener.
#[derive(Debug)]
pub enum NetListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Ipc(UnixListener),
}

impl NetListener {
    fn accept(&self) -> io::Result<NetStream> {
        match self {
            Self::Tcp(l) => l.accept().map(|(s, _)| NetStream::Tcp(s)),
            #[cfg(unix)]
            Self::Ipc(l) => l.accept().map(|(s, _)| NetStream::Ipc(s)),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(l) => l.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Ipc(l) => l.set_nonblocking(nonblocking),
        }
    }
}

#[derive(Debug, Default)]
struct ConnectionSetInner {
    streams: HashMap<PipeId, NetStream>,
    closed: bool,
}

/// Live connections of one endpoint, kept so shutdown can close them.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionSet {
    inner: Arc<Mutex<ConnectionSetInner>>,
    liveness: Arc<Liveness>,
}

impl ConnectionSet {
    pub(crate) fn liveness(&self) -> Arc<Liveness> {
        Arc::clone(&self.liveness)
    }

    /// Returns `false` if the endpoint is already shut down.
    fn insert(&self, id: PipeId, stream: NetStream) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            stream.shutdown();
            return false;
        }
        inner.streams.insert(id, stream);
        self.liveness.up();
        true
    }

    fn remove(&self, id: PipeId) {
        if self.inner.lock().streams.remove(&id).is_some() {
            self.liveness.down();
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub(crate) fn shutdown_all(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        for (_, stream) in inner.streams.drain() {
            stream.shutdown();
            self.liveness.down();
        }
    }
}

enum ReadEnd {
    /// Peer closed the stream
    Eof,
    /// The host stopped accepting messages
    Stopped,
    Io(io::Error),
    Codec(CodecError),
}

/// Run one established connection to completion on the calling thread.
fn run_connection(
    host: &Arc<dyn PipeHost>,
    mut stream: NetStream,
    config: &TransportConfig,
    connections: &ConnectionSet,
) {
    let label = host.label();
    let transport = stream.transport();

    let peer = match handshake::exchange(&mut stream, host.protocol(), config.handshake_timeout) {
        Ok(peer) => peer,
        Err(HandshakeError::Io(e)) => {
            debug!("[{label}] handshake I/O error: {e}");
            host.stats().incr(Statistic::BrokenConnections);
            stream.shutdown();
            return;
        }
        Err(e) => {
            warn!("[{label}] dropping connection: {e}");
            host.stats().incr(Statistic::DroppedConnections);
            stream.shutdown();
            return;
        }
    };

    let options = host.options();
    let id = next_pipe_id();
    let clones = stream.try_clone().and_then(|w| Ok((w, stream.try_clone()?, stream.try_clone()?)));
    let (writer_stream, pipe_stream, tracked) = match clones {
        Ok(c) => c,
        Err(e) => {
            warn!("[{label}] failed to clone stream: {e}");
            stream.shutdown();
            return;
        }
    };

    if !connections.insert(id, tracked) {
        return;
    }

    let (tx, rx) = flume::unbounded();
    let queued = Arc::new(AtomicUsize::new(0));
    let pipe = Pipe::new(id, peer, transport, &options, tx, Arc::clone(&queued), Some(pipe_stream));
    if !host.attach(pipe) {
        debug!("[{label}] connection refused by socket");
        connections.remove(id);
        return;
    }
    debug!("[{label}] pipe {id} attached ({} peer over {})", peer, transport.as_str());

    let writer_host = weak(host);
    let write_buf = config.write_buf_size;
    let spawned = thread::Builder::new()
        .name(format!("sp-writer-{id}"))
        .spawn(move || write_loop(rx, writer_stream, queued, writer_host, write_buf));
    if let Err(e) = spawned {
        warn!("[{label}] failed to spawn writer: {e}");
        host.detach(id);
        connections.remove(id);
        return;
    }

    match read_loop(host.as_ref(), id, stream, options.recv_max_size, config.read_buf_size) {
        ReadEnd::Eof => {
            debug!("[{label}] pipe {id} closed by peer");
            host.stats().incr(Statistic::BrokenConnections);
        }
        ReadEnd::Stopped => trace!("[{label}] pipe {id} stopped"),
        ReadEnd::Io(e) => {
            debug!("[{label}] pipe {id} read error: {e}");
            host.stats().incr(Statistic::BrokenConnections);
        }
        ReadEnd::Codec(e) => {
            warn!("[{label}] pipe {id} dropped: {e}");
            host.stats().incr(Statistic::DroppedConnections);
        }
    }

    host.detach(id);
    connections.remove(id);
}

fn read_loop(
    host: &dyn PipeHost,
    id: PipeId,
    mut stream: NetStream,
    max_size: Option<u64>,
    buf_size: usize,
) -> ReadEnd {
    let mut decoder = MessageDecoder::new(max_size);
    let mut buf = BytesMut::with_capacity(buf_size);
    let mut chunk = vec![0u8; buf_size];

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => return ReadEnd::Eof,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return ReadEnd::Io(e),
        };
        buf.extend_from_slice(&chunk[..n]);

        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(msg)) => {
                    if !host.deliver(id, msg) {
                        return ReadEnd::Stopped;
                    }
                }
                Ok(None) => break,
                Err(e) => return ReadEnd::Codec(e),
            }
        }
    }
}

fn write_loop(
    rx: flume::Receiver<Message>,
    mut stream: NetStream,
    queued: Arc<AtomicUsize>,
    host: Weak<dyn PipeHost>,
    buf_size: usize,
) {
    let mut out = BytesMut::with_capacity(buf_size);

    while let Ok(msg) = rx.recv() {
        let cost = wire_len(&msg);
        out.clear();
        encode_message(&msg, &mut out);
        let written = stream.write_all(&out).and_then(|()| stream.flush());

        queued.fetch_sub(cost, Ordering::AcqRel);
        if let Some(host) = host.upgrade() {
            host.on_writable();
        }
        if let Err(e) = written {
            trace!("writer exiting: {e}");
            break;
        }
    }
    stream.shutdown();
}

fn dial(address: &Address, options: &SocketOptions) -> io::Result<NetStream> {
    match address {
        Address::Tcp { .. } => super::tcp::connect(address, options).map(NetStream::Tcp),
        #[cfg(unix)]
        Address::Ipc(path) => super::ipc::connect(path).map(NetStream::Ipc),
        _ => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{address} is not a stream address"),
        )),
    }
}

/// Start a background dialer for a TCP or IPC address.
pub(crate) fn spawn_dialer(
    host: &Arc<dyn PipeHost>,
    address: Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    let (stop_tx, stop_rx) = flume::bounded::<()>(0);
    let mut endpoint = Endpoint::new(address.clone(), EndpointRole::Connect);
    let connections = endpoint.connections.clone();
    let host = weak(host);

    thread::Builder::new()
        .name(format!("sp-dial-{address}"))
        .spawn(move || dial_loop(host, address, config, stop_rx, connections))?;

    endpoint.stop = Some(stop_tx);
    Ok(endpoint)
}

fn dial_loop(
    host: Weak<dyn PipeHost>,
    address: Address,
    config: TransportConfig,
    stop: flume::Receiver<()>,
    connections: ConnectionSet,
) {
    let Some(initial) = host.upgrade() else {
        return;
    };
    let mut backoff = ReconnectState::new(&initial.options());
    drop(initial);
    // Whether this endpoint is counted in CurrentEndpointErrors
    let mut failing = false;

    loop {
        if stop.is_disconnected() || connections.is_closed() {
            break;
        }
        let Some(h) = host.upgrade() else {
            break;
        };

        let options = h.options();
        h.stats().incr(Statistic::InProgressConnections);
        let dialed = dial(&address, &options);
        h.stats().decr(Statistic::InProgressConnections);

        match dialed {
            Ok(stream) => {
                debug!("[{}] connected to {address}", h.label());
                h.stats().incr(Statistic::EstablishedConnections);
                if std::mem::take(&mut failing) {
                    h.stats().decr(Statistic::CurrentEndpointErrors);
                }
                backoff.reset();
                run_connection(&h, stream, &config, &connections);
            }
            Err(e) => {
                trace!("[{}] connect to {address} failed: {e}", h.label());
                h.stats().incr(Statistic::ConnectErrors);
                if !std::mem::replace(&mut failing, true) {
                    h.stats().incr(Statistic::CurrentEndpointErrors);
                }
            }
        }
        drop(h);

        match stop.recv_timeout(backoff.next_delay()) {
            Err(flume::RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }
    if failing {
        if let Some(h) = host.upgrade() {
            h.stats().decr(Statistic::CurrentEndpointErrors);
        }
    }
    trace!("dialer for {address} exiting");
}

/// Start a background acceptor for a bound listener.
pub(crate) fn spawn_acceptor(
    host: &Arc<dyn PipeHost>,
    listener: NetListener,
    address: Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    listener.set_nonblocking(true)?;

    let (stop_tx, stop_rx) = flume::bounded::<()>(0);
    let mut endpoint = Endpoint::new(address.clone(), EndpointRole::Bind);
    let connections = endpoint.connections.clone();
    let host = weak(host);

    let handle = thread::Builder::new()
        .name(format!("sp-accept-{address}"))
        .spawn(move || accept_loop(host, listener, config, stop_rx, connections))?;

    endpoint.stop = Some(stop_tx);
    endpoint.acceptor = Some(handle);
    Ok(endpoint)
}

fn accept_loop(
    host: Weak<dyn PipeHost>,
    listener: NetListener,
    config: TransportConfig,
    stop: flume::Receiver<()>,
    connections: ConnectionSet,
) {
    loop {
        if stop.is_disconnected() {
            break;
        }
        match listener.accept() {
            Ok(stream) => {
                let Some(h) = host.upgrade() else {
                    break;
                };
                if let Err(e) = prepare_accepted(&stream, &h.options()) {
                    debug!("[{}] failed to configure accepted stream: {e}", h.label());
                    h.stats().incr(Statistic::AcceptErrors);
                    continue;
                }
                h.stats().incr(Statistic::AcceptedConnections);

                let connections = connections.clone();
                let spawned = thread::Builder::new()
                    .name("sp-conn".to_string())
                    .spawn(move || run_connection(&h, stream, &config, &connections));
                if let Err(e) = spawned {
                    warn!("failed to spawn connection thread: {e}");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                match stop.recv_timeout(config.accept_poll) {
                    Err(flume::RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if let Some(h) = host.upgrade() {
                    debug!("[{}] accept failed: {e}", h.label());
                    h.stats().incr(Statistic::AcceptErrors);
                }
                match stop.recv_timeout(config.accept_poll) {
                    Err(flume::RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
        }
    }
    trace!("acceptor exiting");
}

fn prepare_accepted(stream: &NetStream, options: &SocketOptions) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    if let NetStream::Tcp(tcp) = stream {
        super::tcp::configure(tcp, options)?;
    }
    Ok(())
}
