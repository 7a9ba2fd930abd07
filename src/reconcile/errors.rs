//! Reconciliation Errors
//!
//! Only input and configuration errors propagate. Everything that happens
//! on the wire is converted into an outcome at the call site.

use thiserror::Error;

/// Result type for reconciliation runs
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that abort a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Unknown instance type or node role
    #[error("Unknown shard type: '{0}'")]
    InvalidShardType(String),

    /// Discovery returned no members and the node runs solo
    #[error("No members found for replica set '{replica_set}'")]
    NoMembersFound { replica_set: String },

    /// Malformed configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Routing layer needs exactly 1 or 3 config servers
    #[error("Wrong number of config servers: found {0}, expected 1 or 3")]
    WrongConfigServerCount(usize),

    /// Discovery collaborator failed
    #[error("Discovery failed: {0}")]
    Discovery(String),
}

impl ReconcileError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::InvalidShardType(_) => "SHARDKEEPER_INVALID_SHARD_TYPE",
            ReconcileError::NoMembersFound { .. } => "SHARDKEEPER_NO_MEMBERS_FOUND",
            ReconcileError::InvalidConfiguration(_) => "SHARDKEEPER_INVALID_CONFIGURATION",
            ReconcileError::WrongConfigServerCount(_) => "SHARDKEEPER_WRONG_CONFIG_SERVER_COUNT",
            ReconcileError::Discovery(_) => "SHARDKEEPER_DISCOVERY_FAILED",
        }
    }

    /// Every reconcile error stops the run before further mutations.
    pub fn is_fatal(&self) -> bool {
        true
    }
}
