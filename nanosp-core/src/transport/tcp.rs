//! TCP transport.
//!
//! Listeners are created through socket2 so address reuse and the IPv6
//! dual-stack flag can be set before binding.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use socket2::{Domain, SockRef, Socket, Type};
use tracing::debug;

use crate::address::Address;
use crate::config::TransportConfig;
use crate::error::{Result, SpError};
use crate::options::SocketOptions;
use crate::stats::Statistic;

use super::stream::{spawn_acceptor, NetListener};
use super::{Endpoint, PipeHost};

/// Apply per-connection TCP options.
pub fn configure(stream: &TcpStream, options: &SocketOptions) -> io::Result<()> {
    SockRef::from(stream).set_nodelay(options.tcp_nodelay)
}

/// Create a listening socket.
pub fn listen(addr: SocketAddr, ipv4only: bool, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(
        Domain::for_address(addr),
        Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        socket.set_only_v6(ipv4only)?;
    }
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

/// Connect to the first reachable resolved address.
pub fn connect(address: &Address, options: &SocketOptions) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in address.resolve(options.ipv4only)? {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                configure(&stream, options)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address")))
}

pub(super) fn bind(
    host: &Arc<dyn PipeHost>,
    address: &Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    let options = host.options();
    let addr = address.bind_addr(options.ipv4only)?;
    let listener = listen(addr, options.ipv4only, config.backlog).map_err(|e| {
        host.stats().incr(Statistic::BindErrors);
        if e.kind() == io::ErrorKind::AddrInUse {
            SpError::AddressInUse(address.to_string())
        } else {
            SpError::Io(e)
        }
    })?;
    debug!("[{}] listening on {}", host.label(), listener.local_addr()?);
    spawn_acceptor(host, NetListener::Tcp(listener), address.clone(), config)
}
