//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit status.

use std::fmt;
use std::io;

use crate::reconcile::ReconcileError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// A fatal reconcile error stopped the run
    RunAborted,
    /// The run finished with Failed outcomes
    RunFailed,
    /// The cluster could not be reached
    ConnectionFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SHARDKEEPER_CLI_CONFIG_ERROR",
            Self::IoError => "SHARDKEEPER_CLI_IO_ERROR",
            Self::RunAborted => "SHARDKEEPER_CLI_RUN_ABORTED",
            Self::RunFailed => "SHARDKEEPER_CLI_RUN_FAILED",
            Self::ConnectionFailed => "SHARDKEEPER_CLI_CONNECTION_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Run finished with Failed outcomes
    pub fn run_failed(run_id: &str) -> Self {
        Self::new(
            CliErrorCode::RunFailed,
            format!("run {} finished with failed outcomes", run_id),
        )
    }

    /// Cluster unreachable
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConnectionFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ReconcileError> for CliError {
    fn from(e: ReconcileError) -> Self {
        Self::new(CliErrorCode::RunAborted, format!("{} ({})", e, e.code()))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
