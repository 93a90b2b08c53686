//! IPC transport via Unix domain sockets.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::address::Address;
use crate::config::TransportConfig;
use crate::error::{Result, SpError};
use crate::stats::Statistic;

use super::stream::{spawn_acceptor, NetListener};
use super::{Endpoint, PipeHost};

/// Connect to a Unix domain socket.
pub fn connect(path: &Path) -> io::Result<UnixStream> {
    UnixStream::connect(path)
}

/// Bind a Unix domain socket listener.
///
/// A stale socket file left behind by a dead process is replaced; a live
/// listener on the same path is reported as `AddrInUse`.
pub fn listen(path: &Path) -> io::Result<UnixListener> {
    if path.exists() {
        if UnixStream::connect(path).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} is in use", path.display()),
            ));
        }
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path)
}

pub(super) fn bind(
    host: &Arc<dyn PipeHost>,
    path: &Path,
    address: Address,
    config: TransportConfig,
) -> Result<Endpoint> {
    let listener = listen(path).map_err(|e| {
        host.stats().incr(Statistic::BindErrors);
        if e.kind() == io::ErrorKind::AddrInUse {
            SpError::AddressInUse(address.to_string())
        } else {
            SpError::Io(e)
        }
    })?;
    debug!("[{}] listening on {}", host.label(), path.display());

    let mut endpoint = spawn_acceptor(host, NetListener::Ipc(listener), address, config)?;
    let owned = path.to_path_buf();
    endpoint.on_shutdown = Some(Box::new(move || {
        let _ = std::fs::remove_file(owned);
    }));
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_ipc_connect_bind() {
        let path = std::env::temp_dir().join(format!("nanosp-ipc-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let listener = listen(&path).unwrap();
        let mut client = connect(&path).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        assert_eq!(listen(&path).unwrap_err().kind(), io::ErrorKind::AddrInUse);

        drop(listener);
        let _ = std::fs::remove_file(&path);
    }
}
