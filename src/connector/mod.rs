//! Cluster Connector
//!
//! Opens short-lived administrative sessions against one node or against a
//! replica set given an explicit member list.
//!
//! Contract:
//! - Every operation is bounded by the configured timeouts
//! - Failing to connect is a `ConnectionFailed` error, never a panic
//! - No internal retries; retry policy belongs to the caller
//! - A session is owned by the component that opened it and is released
//!   when dropped, on every exit path
//!
//! Two transports implement `ClusterConnector`:
//! - `TcpConnector`: JSON-lines over TCP, used by the CLI
//! - `SimulatedCluster`: in-process cluster with fault injection, used by tests

mod command;
mod errors;
mod memory;
mod tcp;

pub use command::{
    AdminCommand, CommandReply, ALREADY_ENABLED, ALREADY_EXISTS, ALREADY_INITIALIZED,
    ALREADY_SHARDED,
};
pub use errors::{ConnectorError, ConnectorErrorKind, ConnectorResult};
pub use memory::{Fault, SimulatedCluster};
pub use tcp::{ConnectorSettings, TcpConnector};

use std::fmt;

use crate::observability::Logger;

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// A single `host:port`
    Single(String),
    /// An ordered replica-set member list; the session lands on the primary
    /// when one can be identified
    ReplicaSet(Vec<String>),
}

impl ConnectTarget {
    /// The local daemon on `port`.
    pub fn localhost(port: u16) -> Self {
        ConnectTarget::Single(format!("localhost:{}", port))
    }

    pub fn members(hosts: Vec<String>) -> Self {
        ConnectTarget::ReplicaSet(hosts)
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Single(address) => write!(f, "{}", address),
            ConnectTarget::ReplicaSet(hosts) => write!(f, "[{}]", hosts.join(",")),
        }
    }
}

/// An open administrative session.
pub trait AdminSession {
    /// Address this session is connected to.
    fn address(&self) -> &str;

    /// Issue one command and wait for its reply.
    fn run_command(&mut self, command: &AdminCommand) -> ConnectorResult<CommandReply>;
}

/// Factory for administrative sessions.
pub trait ClusterConnector {
    fn connect(&self, target: &ConnectTarget) -> ConnectorResult<Box<dyn AdminSession>>;
}

/// Connect through a replica-set member list.
///
/// Asks each reachable member `hello` in order. Returns the first writable
/// primary; failing that, a session to the primary some member reported;
/// failing that, the first reachable member.
pub(crate) fn connect_replica_set<F>(
    hosts: &[String],
    mut open: F,
) -> ConnectorResult<Box<dyn AdminSession>>
where
    F: FnMut(&str) -> ConnectorResult<Box<dyn AdminSession>>,
{
    if hosts.is_empty() {
        return Err(ConnectorError::connection_failed("empty replica set member list"));
    }

    let mut fallback: Option<Box<dyn AdminSession>> = None;
    let mut reported_primary: Option<String> = None;
    let mut last_error: Option<ConnectorError> = None;

    for host in hosts {
        let mut session = match open(host) {
            Ok(session) => session,
            Err(e) => {
                Logger::trace(
                    "MEMBER_UNREACHABLE",
                    &[("host", host.as_str()), ("reason", e.message.as_str())],
                );
                last_error = Some(e);
                continue;
            }
        };
        match session.run_command(&AdminCommand::Hello) {
            Ok(reply) if reply.is_writable_primary == Some(true) => return Ok(session),
            Ok(reply) => {
                if reported_primary.is_none() {
                    reported_primary = reply.primary.clone();
                }
                if fallback.is_none() {
                    fallback = Some(session);
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    if let Some(primary) = reported_primary {
        if let Ok(session) = open(&primary) {
            return Ok(session);
        }
    }

    fallback.ok_or_else(|| {
        let reason = last_error.map_or_else(|| "no reachable member".to_string(), |e| e.message);
        ConnectorError::connection_failed(format!(
            "no member of [{}] reachable: {}",
            hosts.join(","),
            reason
        ))
    })
}
