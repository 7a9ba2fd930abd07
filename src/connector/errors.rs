//! Connector Error Types
//!
//! Connector errors are never fatal to a run. Callers convert them into
//! outcomes:
//! - ConnectionFailed: target unreachable or connection lost
//! - OperationTimeout: command accepted, response not observed in time
//! - Protocol: the peer answered with something that is not a reply

use std::fmt;
use std::io;

/// Connector error type
#[derive(Debug, Clone)]
pub struct ConnectorError {
    /// Error kind
    pub kind: ConnectorErrorKind,
    /// Error message
    pub message: String,
}

/// Connector error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    /// Cannot reach the target, or the connection dropped mid-command
    ConnectionFailed,

    /// No response within the operation timeout
    OperationTimeout,

    /// Malformed request or reply
    Protocol,
}

impl ConnectorError {
    /// Create a new connector error.
    pub fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::ConnectionFailed, message)
    }

    /// Create an operation timeout error.
    pub fn operation_timeout(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::OperationTimeout, message)
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Protocol, message)
    }

    /// Classify an I/O error raised while talking to `address`.
    pub fn from_io(address: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Self::operation_timeout(format!("{}: {}", address, err))
            }
            io::ErrorKind::InvalidData => Self::protocol(format!("{}: {}", address, err)),
            _ => Self::connection_failed(format!("{}: {}", address, err)),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ConnectorErrorKind::OperationTimeout
    }

    pub fn is_connection_failure(&self) -> bool {
        self.kind == ConnectorErrorKind::ConnectionFailed
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectorError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ConnectorError {}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
