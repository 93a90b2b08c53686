/// nanosp Error Types
///
/// One error enum shared by every layer of the SP stack. Callers match on
/// [`SpError::kind`] when they only care about the category.

use std::io;
use thiserror::Error;

use crate::address::AddressError;
use crate::codec::CodecError;

/// Main error type for SP socket operations
#[derive(Error, Debug)]
pub enum SpError {
    /// Address string is malformed or uses an unknown scheme
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Unknown SP protocol number
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(i32),

    /// Operation is not valid for this protocol or direction
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// State machine violation or use of a closed socket
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Non-blocking call would have blocked
    #[error("Resource temporarily unavailable")]
    TryAgain,

    /// Blocking call exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Blocking wait was interrupted
    #[error("Operation interrupted")]
    Interrupted,

    /// Unknown endpoint, option or statistic
    #[error("Not found: {0}")]
    NotFound(String),

    /// Option value has the wrong type or is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A fixed-capacity resource is exhausted
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Wire data could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Declared frame length exceeds the receive limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u64, max: u64 },

    /// Blocking call aborted because the socket was closed
    #[error("Socket closed")]
    Closed,

    /// Address is already bound by another endpoint
    #[error("Address in use: {0}")]
    AddressInUse(String),

    /// IO error from the operating system
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for SP operations
pub type Result<T> = std::result::Result<T, SpError>;

/// Copyable error category, one per [`SpError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAddress,
    UnsupportedProtocol,
    NotSupported,
    InvalidState,
    TryAgain,
    Timeout,
    Interrupted,
    NotFound,
    InvalidArgument,
    ResourceExhausted,
    MalformedFrame,
    FrameTooLarge,
    Closed,
    AddressInUse,
    Io,
}

impl SpError {
    /// Create a not-found error for an option, endpoint or statistic
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Get the error category
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::UnsupportedProtocol(_) => ErrorKind::UnsupportedProtocol,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::TryAgain => ErrorKind::TryAgain,
            Self::Timeout => ErrorKind::Timeout,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::MalformedFrame(_) => ErrorKind::MalformedFrame,
            Self::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            Self::Closed => ErrorKind::Closed,
            Self::AddressInUse(_) => ErrorKind::AddressInUse,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// POSIX/nanomsg error number for the binding layer.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidAddress(_) | Self::InvalidArgument(_) => 22, // EINVAL
            Self::UnsupportedProtocol(_) => 93,                       // EPROTONOSUPPORT
            Self::NotSupported(_) => 95,                              // EOPNOTSUPP
            Self::InvalidState(_) => 156_384_763,                     // EFSM
            Self::TryAgain => 11,                                     // EAGAIN
            Self::Timeout => 110,                                     // ETIMEDOUT
            Self::Interrupted => 4,                                   // EINTR
            Self::NotFound(_) => 2,                                   // ENOENT
            Self::ResourceExhausted(_) => 24,                         // EMFILE
            Self::MalformedFrame(_) => 74,                            // EBADMSG
            Self::FrameTooLarge { .. } => 90,                         // EMSGSIZE
            Self::Closed => 9,                                        // EBADF
            Self::AddressInUse(_) => 98,                              // EADDRINUSE
            Self::Io(e) => e.raw_os_error().unwrap_or(5),             // EIO
        }
    }

    /// Check if retrying the same call later may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TryAgain | Self::Timeout | Self::Interrupted)
    }
}

impl From<CodecError> for SpError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TooLarge { size, max } => Self::FrameTooLarge { size, max },
            other => Self::MalformedFrame(other.to_string()),
        }
    }
}
