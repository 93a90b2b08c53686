//! Socket configuration options
//!
//! Options are stored in a typed [`SocketOptions`] struct. The keyed
//! `(level, name)` interface used by `get_option`/`set_option` is a table
//! of [`OptionSpec`] entries that convert between [`OptionValue`] and the
//! typed fields.

use bytes::Bytes;
use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME;
use crate::error::{Result, SpError};
use crate::protocol::{Domain, Protocol};
use crate::symbols;

/// Dynamically typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Bytes(Bytes),
}

impl OptionValue {
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bytes(_) => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Int(_) => None,
        }
    }

    const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Bytes> for OptionValue {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for OptionValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

/// Declared value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Int,
    Bytes,
}

/// Allowed direction of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Options addressed by `(level, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Linger,
    SendBuffer,
    RecvBuffer,
    SendTimeout,
    RecvTimeout,
    ReconnectIvl,
    ReconnectIvlMax,
    SendPriority,
    Domain,
    Protocol,
    Ipv4Only,
    SocketName,
    RecvMaxSize,
    MaxTtl,
    TcpNoDelay,
    Subscribe,
    Unsubscribe,
    ReqResendIvl,
    SurveyorDeadline,
}

/// Table entry describing one option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub key: OptionKey,
    pub level: i32,
    pub name: i32,
    pub ty: OptionType,
    pub access: Access,
    pub label: &'static str,
}

const fn spec(
    key: OptionKey,
    level: i32,
    name: i32,
    ty: OptionType,
    access: Access,
    label: &'static str,
) -> OptionSpec {
    OptionSpec {
        key,
        level,
        name,
        ty,
        access,
        label,
    }
}

/// All known options.
pub const OPTION_TABLE: &[OptionSpec] = &[
    spec(
        OptionKey::Linger,
        symbols::SOL_SOCKET,
        symbols::LINGER,
        OptionType::Int,
        Access::ReadWrite,
        "LINGER",
    ),
    spec(
        OptionKey::SendBuffer,
        symbols::SOL_SOCKET,
        symbols::SNDBUF,
        OptionType::Int,
        Access::ReadWrite,
        "SNDBUF",
    ),
    spec(
        OptionKey::RecvBuffer,
        symbols::SOL_SOCKET,
        symbols::RCVBUF,
        OptionType::Int,
        Access::ReadWrite,
        "RCVBUF",
    ),
    spec(
        OptionKey::SendTimeout,
        symbols::SOL_SOCKET,
        symbols::SNDTIMEO,
        OptionType::Int,
        Access::ReadWrite,
        "SNDTIMEO",
    ),
    spec(
        OptionKey::RecvTimeout,
        symbols::SOL_SOCKET,
        symbols::RCVTIMEO,
        OptionType::Int,
        Access::ReadWrite,
        "RCVTIMEO",
    ),
    spec(
        OptionKey::ReconnectIvl,
        symbols::SOL_SOCKET,
        symbols::RECONNECT_IVL,
        OptionType::Int,
        Access::ReadWrite,
        "RECONNECT_IVL",
    ),
    spec(
        OptionKey::ReconnectIvlMax,
        symbols::SOL_SOCKET,
        symbols::RECONNECT_IVL_MAX,
        OptionType::Int,
        Access::ReadWrite,
        "RECONNECT_IVL_MAX",
    ),
    spec(
        OptionKey::SendPriority,
        symbols::SOL_SOCKET,
        symbols::SNDPRIO,
        OptionType::Int,
        Access::ReadWrite,
        "SNDPRIO",
    ),
    spec(
        OptionKey::Domain,
        symbols::SOL_SOCKET,
        symbols::DOMAIN,
        OptionType::Int,
        Access::ReadOnly,
        "DOMAIN",
    ),
    spec(
        OptionKey::Protocol,
        symbols::SOL_SOCKET,
        symbols::PROTOCOL,
        OptionType::Int,
        Access::ReadOnly,
        "PROTOCOL",
    ),
    spec(
        OptionKey::Ipv4Only,
        symbols::SOL_SOCKET,
        symbols::IPV4ONLY,
        OptionType::Int,
        Access::ReadWrite,
        "IPV4ONLY",
    ),
    spec(
        OptionKey::SocketName,
        symbols::SOL_SOCKET,
        symbols::SOCKET_NAME,
        OptionType::Bytes,
        Access::ReadWrite,
        "SOCKET_NAME",
    ),
    spec(
        OptionKey::RecvMaxSize,
        symbols::SOL_SOCKET,
        symbols::RCVMAXSIZE,
        OptionType::Int,
        Access::ReadWrite,
        "RCVMAXSIZE",
    ),
    spec(
        OptionKey::MaxTtl,
        symbols::SOL_SOCKET,
        symbols::MAXTTL,
        OptionType::Int,
        Access::ReadWrite,
        "MAXTTL",
    ),
    spec(
        OptionKey::TcpNoDelay,
        symbols::TCP,
        symbols::TCP_NODELAY,
        OptionType::Int,
        Access::ReadWrite,
        "TCP_NODELAY",
    ),
    spec(
        OptionKey::Subscribe,
        symbols::SUB,
        symbols::SUB_SUBSCRIBE,
        OptionType::Bytes,
        Access::WriteOnly,
        "SUB_SUBSCRIBE",
    ),
    spec(
        OptionKey::Unsubscribe,
        symbols::SUB,
        symbols::SUB_UNSUBSCRIBE,
        OptionType::Bytes,
        Access::WriteOnly,
        "SUB_UNSUBSCRIBE",
    ),
    spec(
        OptionKey::ReqResendIvl,
        symbols::REQ,
        symbols::REQ_RESEND_IVL,
        OptionType::Int,
        Access::ReadWrite,
        "REQ_RESEND_IVL",
    ),
    spec(
        OptionKey::SurveyorDeadline,
        symbols::SURVEYOR,
        symbols::SURVEYOR_DEADLINE,
        OptionType::Int,
        Access::ReadWrite,
        "SURVEYOR_DEADLINE",
    ),
];

/// Find the option addressed by `(level, name)` on a socket of `protocol`.
///
/// Protocol-level options only exist on sockets of that protocol.
pub fn lookup(protocol: Protocol, level: i32, name: i32) -> Result<&'static OptionSpec> {
    let protocol_level = level > 0;
    if protocol_level && level != protocol.as_raw() {
        return Err(SpError::not_found(format!(
            "option level {level} on a {protocol} socket"
        )));
    }
    OPTION_TABLE
        .iter()
        .find(|s| s.level == level && s.name == name)
        .ok_or_else(|| SpError::not_found(format!("option ({level}, {name})")))
}

/// Outcome of applying a keyed option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Stored in [`SocketOptions`]
    Stored(OptionKey),
    /// Must be forwarded to the protocol engine
    Protocol(OptionKey, Bytes),
}

/// Socket configuration options.
///
/// These options control socket behavior including timeouts, buffer sizes,
/// and reconnection.
///
/// # Examples
///
/// ```
/// use nanosp_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_send_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Linger timeout (LINGER)
    ///
    /// Time `close` waits for queued outbound messages.
    /// - `None`: Wait indefinitely
    /// - `Some(Duration::ZERO)`: Discard pending messages
    /// - Default: 1 second
    pub linger: Option<Duration>,

    /// Outbound queue budget per connection, in bytes (SNDBUF)
    pub send_buffer: usize,

    /// Inbound queue budget per socket, in bytes (RCVBUF)
    pub recv_buffer: usize,

    /// Send timeout (SNDTIMEO)
    ///
    /// - `None`: Block indefinitely (default)
    /// - `Some(duration)`: Fail with `Timeout` after duration
    pub send_timeout: Option<Duration>,

    /// Receive timeout (RCVTIMEO)
    ///
    /// - `None`: Block indefinitely (default)
    /// - `Some(duration)`: Fail with `Timeout` after duration
    pub recv_timeout: Option<Duration>,

    /// Reconnect interval (RECONNECT_IVL)
    ///
    /// Initial reconnection delay after connection loss.
    /// - Default: 100ms
    pub reconnect_ivl: Duration,

    /// Maximum reconnect interval (RECONNECT_IVL_MAX)
    ///
    /// - Default: 0 (no backoff, use `reconnect_ivl` always)
    /// - When > 0: Doubles `reconnect_ivl` up to this value
    pub reconnect_ivl_max: Duration,

    /// Outbound priority of endpoints created from now on (SNDPRIO, 1..=16)
    ///
    /// Lower values are preferred by load-balancing protocols.
    pub send_priority: u8,

    /// Restrict TCP to IPv4 (IPV4ONLY)
    pub ipv4only: bool,

    /// Human readable socket name used in logs (SOCKET_NAME)
    pub socket_name: Bytes,

    /// Maximum accepted inbound frame size (RCVMAXSIZE)
    ///
    /// - `None`: No limit
    /// - Default: 1 MiB
    pub recv_max_size: Option<u64>,

    /// Maximum number of hops a request may travel through devices (MAXTTL)
    pub max_ttl: u8,

    /// Disable Nagle's algorithm on TCP connections (TCP_NODELAY)
    pub tcp_nodelay: bool,

    /// REQ resend interval (REQ_RESEND_IVL)
    pub req_resend_ivl: Duration,

    /// SURVEYOR deadline (SURVEYOR_DEADLINE)
    pub surveyor_deadline: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            linger: Some(Duration::from_secs(1)),
            send_buffer: 128 * 1024,
            recv_buffer: 128 * 1024,
            send_timeout: None, // Block indefinitely
            recv_timeout: None, // Block indefinitely
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO, // No backoff
            send_priority: 8,
            ipv4only: true,
            socket_name: Bytes::new(),
            recv_max_size: Some(DEFAULT_MAX_FRAME),
            max_ttl: 8,
            tcp_nodelay: false,
            req_resend_ivl: Duration::from_secs(60),
            surveyor_deadline: Duration::from_secs(1),
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use nanosp_core::options::SocketOptions;
    /// use std::time::Duration;
    ///
    /// let opts = SocketOptions::new().with_recv_timeout(Duration::from_millis(250));
    /// assert_eq!(opts.recv_timeout, Some(Duration::from_millis(250)));
    /// ```
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Set send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set reconnection interval.
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnection interval for exponential backoff.
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set the outbound queue budget.
    pub fn with_send_buffer(mut self, bytes: usize) -> Self {
        self.send_buffer = bytes;
        self
    }

    /// Set the inbound queue budget.
    pub fn with_recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer = bytes;
        self
    }

    /// Set the inbound frame limit.
    pub fn with_recv_max_size(mut self, max: Option<u64>) -> Self {
        self.recv_max_size = max;
        self
    }

    /// Set TCP_NODELAY.
    pub fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    /// Set REQ resend interval.
    pub fn with_req_resend_ivl(mut self, ivl: Duration) -> Self {
        self.req_resend_ivl = ivl;
        self
    }

    /// Set SURVEYOR deadline.
    pub fn with_surveyor_deadline(mut self, deadline: Duration) -> Self {
        self.surveyor_deadline = deadline;
        self
    }

    /// Apply a keyed option value.
    ///
    /// Protocol options that are not stored here (subscriptions) are
    /// returned as [`Applied::Protocol`] for the engine to consume.
    pub fn apply(&mut self, spec: &OptionSpec, value: OptionValue) -> Result<Applied> {
        if spec.access == Access::ReadOnly {
            return Err(SpError::NotSupported("option is read-only"));
        }
        check_type(spec, &value)?;

        match (spec.key, value) {
            (OptionKey::Linger, OptionValue::Int(v)) => self.linger = timeout_from_ms(spec, v)?,
            (OptionKey::SendBuffer, OptionValue::Int(v)) => self.send_buffer = positive(spec, v)?,
            (OptionKey::RecvBuffer, OptionValue::Int(v)) => self.recv_buffer = positive(spec, v)?,
            (OptionKey::SendTimeout, OptionValue::Int(v)) => {
                self.send_timeout = timeout_from_ms(spec, v)?;
            }
            (OptionKey::RecvTimeout, OptionValue::Int(v)) => {
                self.recv_timeout = timeout_from_ms(spec, v)?;
            }
            (OptionKey::ReconnectIvl, OptionValue::Int(v)) => {
                self.reconnect_ivl = duration_from_ms(spec, v)?;
            }
            (OptionKey::ReconnectIvlMax, OptionValue::Int(v)) => {
                self.reconnect_ivl_max = duration_from_ms(spec, v)?;
            }
            (OptionKey::SendPriority, OptionValue::Int(v)) => {
                self.send_priority = in_range(spec, v, 1, 16)?;
            }
            (OptionKey::Ipv4Only, OptionValue::Int(v)) => self.ipv4only = flag(spec, v)?,
            (OptionKey::SocketName, OptionValue::Bytes(b)) => self.socket_name = b,
            (OptionKey::RecvMaxSize, OptionValue::Int(v)) => {
                self.recv_max_size = match v {
                    -1 => None,
                    v if v >= 0 => Some(v as u64),
                    _ => return Err(out_of_range(spec, v)),
                };
            }
            (OptionKey::MaxTtl, OptionValue::Int(v)) => self.max_ttl = in_range(spec, v, 1, 255)?,
            (OptionKey::TcpNoDelay, OptionValue::Int(v)) => self.tcp_nodelay = flag(spec, v)?,
            (OptionKey::ReqResendIvl, OptionValue::Int(v)) => {
                self.req_resend_ivl = duration_from_ms(spec, v)?;
            }
            (OptionKey::SurveyorDeadline, OptionValue::Int(v)) => {
                self.surveyor_deadline = duration_from_ms(spec, v)?;
            }
            (key @ (OptionKey::Subscribe | OptionKey::Unsubscribe), OptionValue::Bytes(b)) => {
                return Ok(Applied::Protocol(key, b));
            }
            _ => return Err(SpError::NotSupported("option cannot be set")),
        }
        Ok(Applied::Stored(spec.key))
    }

    /// Read a keyed option value.
    pub fn read(
        &self,
        spec: &OptionSpec,
        domain: Domain,
        protocol: Protocol,
    ) -> Result<OptionValue> {
        if spec.access == Access::WriteOnly {
            return Err(SpError::NotSupported("option is write-only"));
        }
        let value = match spec.key {
            OptionKey::Linger => OptionValue::Int(timeout_to_ms(self.linger)),
            OptionKey::SendBuffer => OptionValue::Int(self.send_buffer as i64),
            OptionKey::RecvBuffer => OptionValue::Int(self.recv_buffer as i64),
            OptionKey::SendTimeout => OptionValue::Int(timeout_to_ms(self.send_timeout)),
            OptionKey::RecvTimeout => OptionValue::Int(timeout_to_ms(self.recv_timeout)),
            OptionKey::ReconnectIvl => OptionValue::Int(self.reconnect_ivl.as_millis() as i64),
            OptionKey::ReconnectIvlMax => {
                OptionValue::Int(self.reconnect_ivl_max.as_millis() as i64)
            }
            OptionKey::SendPriority => OptionValue::Int(i64::from(self.send_priority)),
            OptionKey::Domain => OptionValue::Int(i64::from(domain.as_raw())),
            OptionKey::Protocol => OptionValue::Int(i64::from(protocol.as_raw())),
            OptionKey::Ipv4Only => OptionValue::Int(i64::from(self.ipv4only)),
            OptionKey::SocketName => OptionValue::Bytes(self.socket_name.clone()),
            OptionKey::RecvMaxSize => {
                OptionValue::Int(self.recv_max_size.map_or(-1, |v| v as i64))
            }
            OptionKey::MaxTtl => OptionValue::Int(i64::from(self.max_ttl)),
            OptionKey::TcpNoDelay => OptionValue::Int(i64::from(self.tcp_nodelay)),
            OptionKey::ReqResendIvl => OptionValue::Int(self.req_resend_ivl.as_millis() as i64),
            OptionKey::SurveyorDeadline => {
                OptionValue::Int(self.surveyor_deadline.as_millis() as i64)
            }
            OptionKey::Subscribe | OptionKey::Unsubscribe => {
                return Err(SpError::NotSupported("option is write-only"));
            }
        };
        Ok(value)
    }
}

fn check_type(spec: &OptionSpec, value: &OptionValue) -> Result<()> {
    let ok = matches!(
        (spec.ty, value),
        (OptionType::Int, OptionValue::Int(_)) | (OptionType::Bytes, OptionValue::Bytes(_))
    );
    if ok {
        Ok(())
    } else {
        Err(SpError::invalid_argument(format!(
            "{} expects {:?}, got {}",
            spec.label,
            spec.ty,
            value.type_name()
        )))
    }
}

fn out_of_range(spec: &OptionSpec, v: i64) -> SpError {
    SpError::invalid_argument(format!("{} value {v} out of range", spec.label))
}

fn timeout_from_ms(spec: &OptionSpec, v: i64) -> Result<Option<Duration>> {
    match v {
        -1 => Ok(None),
        v if v >= 0 => Ok(Some(Duration::from_millis(v as u64))),
        _ => Err(out_of_range(spec, v)),
    }
}

fn timeout_to_ms(t: Option<Duration>) -> i64 {
    t.map_or(-1, |d| d.as_millis() as i64)
}

fn duration_from_ms(spec: &OptionSpec, v: i64) -> Result<Duration> {
    if v < 0 {
        return Err(out_of_range(spec, v));
    }
    Ok(Duration::from_millis(v as u64))
}

fn positive(spec: &OptionSpec, v: i64) -> Result<usize> {
    if v <= 0 {
        return Err(out_of_range(spec, v));
    }
    usize::try_from(v).map_err(|_| out_of_range(spec, v))
}

fn in_range(spec: &OptionSpec, v: i64, lo: i64, hi: i64) -> Result<u8> {
    if v < lo || v > hi {
        return Err(out_of_range(spec, v));
    }
    Ok(v as u8)
}

fn flag(spec: &OptionSpec, v: i64) -> Result<bool> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(out_of_range(spec, v)),
    }
}
