//! Address abstraction for transport-agnostic socket addressing.
//!
//! Parses `<scheme>://<scheme-specific-part>` strings into a typed address.
//! TCP hosts are kept unresolved so connecting endpoints can re-resolve on
//! every dial attempt.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

/// Transport kind of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Inproc,
    Ipc,
    Tcp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inproc => "inproc",
            Self::Ipc => "ipc",
            Self::Tcp => "tcp",
        }
    }
}

/// Transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// TCP transport: `tcp://host:port`, `*` as host binds all interfaces
    Tcp { host: String, port: u16 },
    /// IPC transport (Unix domain socket): `ipc:///path/to/socket`
    Ipc(PathBuf),
    /// In-process transport: `inproc://name`
    Inproc(String),
}

impl Address {
    /// Parse an address from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    /// - `tcp://*:5555` (bind only)
    /// - `tcp://localhost:5555` (resolved when dialing)
    /// - `ipc:///tmp/socket.sock` (Unix only)
    /// - `inproc://name`
    ///
    /// # Examples
    ///
    /// ```
    /// use nanosp_core::address::Address;
    ///
    /// let address = Address::parse("tcp://127.0.0.1:5555").unwrap();
    /// assert!(address.is_tcp());
    ///
    /// let address = Address::parse("inproc://my-endpoint").unwrap();
    /// assert!(address.is_inproc());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        s.parse()
    }

    /// Transport selected by the scheme.
    pub fn transport(&self) -> TransportKind {
        match self {
            Self::Tcp { .. } => TransportKind::Tcp,
            Self::Ipc(_) => TransportKind::Ipc,
            Self::Inproc(_) => TransportKind::Inproc,
        }
    }

    /// Returns true if this is a TCP address.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp { .. })
    }

    /// Returns true if this is an IPC address.
    pub fn is_ipc(&self) -> bool {
        matches!(self, Self::Ipc(_))
    }

    /// Returns true if this is an inproc address.
    pub fn is_inproc(&self) -> bool {
        matches!(self, Self::Inproc(_))
    }

    /// Resolve a TCP address for listening.
    ///
    /// `*` maps to the unspecified address of the preferred family.
    pub fn bind_addr(&self, ipv4only: bool) -> io::Result<SocketAddr> {
        let Self::Tcp { host, port } = self else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a tcp address"));
        };
        if host == "*" {
            let ip = if ipv4only {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            } else {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            };
            return Ok(SocketAddr::new(ip, *port));
        }
        self.resolve(ipv4only)?
            .into_iter()
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no usable address"))
    }

    /// Resolve a TCP address for dialing, honouring the IPv4-only preference.
    pub fn resolve(&self, ipv4only: bool) -> io::Result<Vec<SocketAddr>> {
        let Self::Tcp { host, port } = self else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a tcp address"));
        };
        if host == "*" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "wildcard host cannot be dialed",
            ));
        }
        let trimmed = host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = (trimmed, *port)
            .to_socket_addrs()?
            .filter(|a| !ipv4only || a.is_ipv4())
            .collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host} did not resolve to a usable address"),
            ));
        }
        Ok(addrs)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((scheme, rest)) = s.split_once("://") else {
            return Err(AddressError::MissingScheme(s.to_string()));
        };
        match scheme {
            "tcp" => parse_tcp(rest),
            "ipc" => {
                if rest.is_empty() {
                    return Err(AddressError::InvalidIpcPath(s.to_string()));
                }
                #[cfg(unix)]
                {
                    Ok(Self::Ipc(PathBuf::from(rest)))
                }
                #[cfg(not(unix))]
                {
                    Err(AddressError::IpcNotSupported)
                }
            }
            "inproc" => {
                if rest.is_empty() {
                    Err(AddressError::InvalidInprocName(
                        "inproc name cannot be empty".to_string(),
                    ))
                } else {
                    Ok(Self::Inproc(rest.to_string()))
                }
            }
            other => Err(AddressError::InvalidScheme(other.to_string())),
        }
    }
}

fn parse_tcp(rest: &str) -> Result<Address, AddressError> {
    let invalid = || AddressError::InvalidTcpAddress(rest.to_string());
    let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if host.is_empty() {
        return Err(invalid());
    }
    if host.starts_with('[') {
        // Bracketed hosts must be IPv6 literals.
        let inner = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .ok_or_else(invalid)?;
        inner.parse::<Ipv6Addr>().map_err(|_| invalid())?;
    } else if host.contains(':') || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(Address::Tcp {
        host: host.to_string(),
        port,
    })
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Self::Inproc(name) => write!(f, "inproc://{name}"),
        }
    }
}

/// Errors that can occur when parsing addresses.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("Missing scheme in address: {0} (expected <scheme>://...)")]
    MissingScheme(String),

    #[error("Invalid scheme in address: {0} (expected tcp, ipc, or inproc)")]
    InvalidScheme(String),

    #[error("Invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("Invalid IPC path: {0}")]
    InvalidIpcPath(String),

    #[error("Invalid inproc name: {0}")]
    InvalidInprocName(String),

    #[error("IPC transport not supported on this platform")]
    IpcNotSupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_ipv4() {
        let address = Address::parse("tcp://127.0.0.1:5555").unwrap();
        assert!(address.is_tcp());
        assert_eq!(address.to_string(), "tcp://127.0.0.1:5555");
        assert_eq!(
            address.bind_addr(true).unwrap(),
            "127.0.0.1:5555".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let address = Address::parse("tcp://[::1]:5555").unwrap();
        assert!(address.is_tcp());
        let resolved = address.resolve(false).unwrap();
        assert!(resolved[0].is_ipv6());
        assert!(address.resolve(true).is_err());
    }

    #[test]
    fn test_parse_tcp_wildcard() {
        let address = Address::parse("tcp://*:6000").unwrap();
        let bind = address.bind_addr(true).unwrap();
        assert!(bind.ip().is_unspecified());
        assert_eq!(bind.port(), 6000);
        assert!(address.resolve(true).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_ipc() {
        let address = Address::parse("ipc:///tmp/test.sock").unwrap();
        assert!(address.is_ipc());
        assert_eq!(address.to_string(), "ipc:///tmp/test.sock");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = Address::parse("http://127.0.0.1:5555");
        assert!(matches!(result, Err(AddressError::InvalidScheme(_))));
        let result = Address::parse("127.0.0.1:5555");
        assert!(matches!(result, Err(AddressError::MissingScheme(_))));
    }

    #[test]
    fn test_invalid_tcp_address() {
        assert!(matches!(
            Address::parse("tcp://invalid:port"),
            Err(AddressError::InvalidTcpAddress(_))
        ));
        assert!(Address::parse("tcp://:5555").is_err());
        assert!(Address::parse("tcp://127.0.0.1").is_err());
        assert!(Address::parse("tcp://127.0.0.1:70000").is_err());
        assert!(Address::parse("tcp://[nope]:1").is_err());
    }

    #[test]
    fn test_parse_inproc() {
        let address = Address::parse("inproc://my-endpoint").unwrap();
        assert!(address.is_inproc());
        assert_eq!(address.transport(), TransportKind::Inproc);
        assert_eq!(address.to_string(), "inproc://my-endpoint");
    }

    #[test]
    fn test_invalid_inproc_empty() {
        let result = Address::parse("inproc://");
        assert!(matches!(result, Err(AddressError::InvalidInprocName(_))));
    }
}
