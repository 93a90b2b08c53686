//! Plain-handle interface.
//!
//! Free functions over opaque [`SocketHandle`] values, for callers that
//! cannot hold a [`Socket`] directly (bindings, test harnesses). Handles
//! resolve through a process-wide table; a handle that is closed or was
//! never issued fails with `InvalidState`.
//!
//! ```rust,no_run
//! use nanosp::nn;
//! use nanosp::symbols::{AF_SP, PAIR};
//!
//! let s = nn::socket(AF_SP, PAIR)?;
//! nn::bind(s, "inproc://nn-doc")?;
//! nn::close(s)?;
//! # Ok::<(), nanosp::SpError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use nanosp_core::error::{Result, SpError};
use nanosp_core::message::Message;
use nanosp_core::options::OptionValue;
use nanosp_core::stats::Statistic;
use nanosp_core::symbols::Symbol;
use nanosp_proto::{EndpointId, PollSet, Socket, SocketHandle};

static SOCKETS: Lazy<Mutex<HashMap<SocketHandle, Arc<Socket>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lookup(s: SocketHandle) -> Result<Arc<Socket>> {
    SOCKETS
        .lock()
        .get(&s)
        .cloned()
        .ok_or(SpError::InvalidState("unknown socket handle"))
}

/// Open a socket from raw domain and protocol numbers.
pub fn socket(domain: i32, protocol: i32) -> Result<SocketHandle> {
    let socket = Socket::open_raw(domain, protocol)?;
    let handle = socket.handle();
    SOCKETS.lock().insert(handle, Arc::new(socket));
    debug!("[NN] opened {handle}");
    Ok(handle)
}

/// Close a socket. Blocked calls on it return `Closed`.
pub fn close(s: SocketHandle) -> Result<()> {
    let socket = SOCKETS
        .lock()
        .remove(&s)
        .ok_or(SpError::InvalidState("unknown socket handle"))?;
    // Lingering happens outside the table lock.
    socket.close()
}

pub fn bind(s: SocketHandle, address: &str) -> Result<EndpointId> {
    lookup(s)?.bind(address)
}

pub fn connect(s: SocketHandle, address: &str) -> Result<EndpointId> {
    lookup(s)?.connect(address)
}

pub fn shutdown(s: SocketHandle, endpoint: EndpointId) -> Result<()> {
    lookup(s)?.shutdown(endpoint)
}

pub fn send(s: SocketHandle, body: impl Into<Bytes>, flags: i32) -> Result<usize> {
    lookup(s)?.send(body, flags)
}

pub fn recv(s: SocketHandle, flags: i32) -> Result<Bytes> {
    lookup(s)?.recv(flags)
}

pub fn sendmsg(s: SocketHandle, msg: Message, flags: i32) -> Result<usize> {
    lookup(s)?.send_msg(msg, flags)
}

pub fn recvmsg(s: SocketHandle, flags: i32) -> Result<Message> {
    lookup(s)?.recv_msg(flags)
}

pub fn getsockopt(s: SocketHandle, level: i32, option: i32) -> Result<OptionValue> {
    lookup(s)?.get_option(level, option)
}

pub fn setsockopt(
    s: SocketHandle,
    level: i32,
    option: i32,
    value: impl Into<OptionValue>,
) -> Result<()> {
    lookup(s)?.set_option(level, option, value)
}

/// Read a statistic by its numeric id (`STAT_*`).
pub fn get_statistic(s: SocketHandle, stat: i32) -> Result<u64> {
    let stat = Statistic::from_raw(stat)?;
    Ok(lookup(s)?.get_statistic(stat))
}

/// One entry of a [`poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFd {
    pub fd: SocketHandle,
    pub events: i16,
    pub revents: i16,
}

impl PollFd {
    #[must_use]
    pub fn new(fd: SocketHandle, events: i16) -> Self {
        Self {
            fd,
            events,
            revents: 0,
        }
    }
}

/// Wait for readiness on `fds`.
///
/// A negative `timeout_ms` blocks indefinitely, zero checks once. Returns
/// the number of entries with non-zero `revents`.
pub fn poll(fds: &mut [PollFd], timeout_ms: i32) -> Result<usize> {
    let sockets = fds
        .iter()
        .map(|fd| lookup(fd.fd))
        .collect::<Result<Vec<_>>>()?;

    let mut set = PollSet::new();
    for (fd, socket) in fds.iter().zip(&sockets) {
        set.add(socket, fd.events);
    }
    let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
    let ready = nanosp_proto::poll(&mut set, timeout)?;
    for (index, fd) in fds.iter_mut().enumerate() {
        fd.revents = set.revents(index);
    }
    Ok(ready)
}

/// Forward between raw sockets until one is closed.
pub fn device(s1: SocketHandle, s2: Option<SocketHandle>) -> Result<()> {
    let a = lookup(s1)?;
    let b = s2.map(lookup).transpose()?;
    nanosp_proto::device(&a, b.as_deref())
}

pub fn symbol(index: usize) -> Option<Symbol> {
    nanosp_core::symbols::symbol(index)
}

/// Close every open socket.
pub fn term() {
    let sockets: Vec<_> = SOCKETS.lock().drain().map(|(_, s)| s).collect();
    debug!("[NN] closing {} sockets", sockets.len());
    for socket in sockets {
        let _ = socket.close();
    }
}
