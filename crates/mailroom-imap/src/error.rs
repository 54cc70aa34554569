//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed server data.
    #[error("Parse error at position {position}: {message} (in {raw:?})")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
        /// The offending raw text.
        raw: String,
    },

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// No connection is open.
    #[error("Not connected")]
    NotConnected,

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The server does not advertise the required capability.
    #[error("Server does not support {0}")]
    Unsupported(String),

    /// The caller passed an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A cache blob could not be written or read.
    #[error("Cache error: {0}")]
    Cache(#[from] serde_json::Error),

    /// Message data could not be decoded.
    #[error("MIME error: {0}")]
    Mime(#[from] mailroom_mime::Error),
}

/// Coarse error classes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte layer failed; the connection is gone.
    Transport,
    /// The server sent something that could not be parsed.
    Protocol,
    /// The server answered NO, BAD or BYE.
    ServerRejected,
    /// The operation is not valid in the current connection state.
    State,
    /// The server lacks a capability the operation needs.
    UnsupportedExtension,
    /// The caller supplied an invalid argument.
    InvalidInput,
    /// Cache serialization failed.
    Cache,
}

impl Error {
    /// Returns the class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Tls(_) | Self::InvalidDnsName(_) | Self::Timeout(_) => {
                ErrorKind::Transport
            }
            Self::Parse { .. } | Self::Protocol(_) | Self::Mime(_) => ErrorKind::Protocol,
            Self::Auth(_) | Self::No(_) | Self::Bad(_) | Self::Bye(_) => ErrorKind::ServerRejected,
            Self::NotConnected | Self::InvalidState(_) => ErrorKind::State,
            Self::Unsupported(_) => ErrorKind::UnsupportedExtension,
            Self::InvalidArgument(_) => ErrorKind::InvalidInput,
            Self::Cache(_) => ErrorKind::Cache,
        }
    }

    /// Returns true if this error means the connection can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport) || matches!(self, Self::Bye(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
