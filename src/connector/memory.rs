//! In-process simulated cluster
//!
//! Holds the state a real deployment would hold (one replica set, the
//! routing layer's shard list, sharded databases and collections) and
//! answers administrative commands the way the database does, including
//! the "already ..." replies that make every mutation idempotent.
//!
//! Faults are queued per command name and consumed in order, which lets
//! tests reproduce timeouts and connections dropped before or after a
//! mutation was applied.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::command::{
    AdminCommand, CommandReply, ALREADY_ENABLED, ALREADY_EXISTS, ALREADY_INITIALIZED,
    ALREADY_SHARDED,
};
use super::errors::{ConnectorError, ConnectorResult};
use super::{connect_replica_set, AdminSession, ClusterConnector, ConnectTarget};
use crate::topology::ReplicaSetConfig;

/// Injected failure for the next matching command.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Time out without applying the command
    Timeout,
    /// Apply the command, then time out
    TimeoutAfterApply,
    /// Drop the connection without applying the command
    DropConnection,
    /// Apply the command, then drop the connection
    DropConnectionAfterApply,
    /// Answer with this reply instead of executing the command
    Reply(CommandReply),
}

#[derive(Debug, Default)]
struct ClusterState {
    replica_set: Option<ReplicaSetConfig>,
    shards: Vec<String>,
    sharded_databases: BTreeSet<String>,
    sharded_collections: BTreeMap<String, BTreeMap<String, i32>>,
    primary: Option<String>,
    unreachable: BTreeSet<String>,
    connection_budget: Option<usize>,
    faults: VecDeque<(String, Fault)>,
    commands: Vec<AdminCommand>,
    connections: Vec<String>,
    open_sessions: usize,
}

impl ClusterState {
    fn take_fault(&mut self, command: &str) -> Option<Fault> {
        let position = self.faults.iter().position(|(name, _)| name == command)?;
        self.faults.remove(position).map(|(_, fault)| fault)
    }

    fn apply(&mut self, address: &str, command: &AdminCommand) -> CommandReply {
        match command {
            AdminCommand::Hello => CommandReply {
                is_writable_primary: Some(self.primary.as_deref().map_or(true, |p| p == address)),
                primary: self.primary.clone(),
                ..CommandReply::success()
            },
            AdminCommand::ReplSetInitiate { config } => {
                if self.replica_set.is_some() {
                    return CommandReply::failure(ALREADY_INITIALIZED).with_code(23);
                }
                if let Err(reason) = validate_config(config) {
                    return CommandReply::failure(reason).with_code(93);
                }
                self.replica_set = Some(config.clone());
                CommandReply::success()
            }
            AdminCommand::ReplSetGetConfig { name } => match &self.replica_set {
                Some(config) if &config.id == name => {
                    CommandReply::success().with_config(config.clone())
                }
                Some(config) => CommandReply::failure(format!(
                    "replica set name '{}' does not match '{}'",
                    name, config.id
                ))
                .with_code(93),
                None => CommandReply::failure("no replset config has been received").with_code(94),
            },
            AdminCommand::ReplSetReconfig { config } => {
                let Some(current) = &self.replica_set else {
                    return CommandReply::failure("not yet initialized").with_code(94);
                };
                if config.id != current.id {
                    return CommandReply::failure("replica set name cannot change").with_code(103);
                }
                if config.version <= current.version {
                    return CommandReply::failure(format!(
                        "version {} must be greater than current version {}",
                        config.version, current.version
                    ))
                    .with_code(103);
                }
                if let Err(reason) = validate_config(config) {
                    return CommandReply::failure(reason).with_code(93);
                }
                self.replica_set = Some(config.clone());
                CommandReply::success()
            }
            AdminCommand::AddShard { shard } => {
                if self.shards.contains(shard) {
                    return CommandReply::failure(format!("shard '{}' {}", shard, ALREADY_EXISTS));
                }
                self.shards.push(shard.clone());
                let name = match shard.split_once('/') {
                    Some((name, _)) => name.to_string(),
                    None => format!("shard{:04}", self.shards.len() - 1),
                };
                CommandReply {
                    shard_added: Some(name),
                    ..CommandReply::success()
                }
            }
            AdminCommand::EnableSharding { database } => {
                if !self.sharded_databases.insert(database.clone()) {
                    return CommandReply::failure(ALREADY_ENABLED);
                }
                CommandReply::success()
            }
            AdminCommand::ShardCollection { namespace, key } => {
                let database = namespace.split('.').next().unwrap_or_default();
                if !self.sharded_databases.contains(database) {
                    return CommandReply::failure(format!(
                        "sharding not enabled for db {}",
                        database
                    ));
                }
                if self.sharded_collections.contains_key(namespace) {
                    return CommandReply::failure(ALREADY_SHARDED);
                }
                self.sharded_collections.insert(namespace.clone(), key.clone());
                CommandReply {
                    collection_sharded: Some(namespace.clone()),
                    ..CommandReply::success()
                }
            }
        }
    }
}

fn validate_config(config: &ReplicaSetConfig) -> Result<(), String> {
    if config.members.is_empty() {
        return Err("replica set configuration has no members".to_string());
    }
    let ids: BTreeSet<u32> = config.members.iter().map(|m| m.member_id).collect();
    let hosts: BTreeSet<&str> = config.members.iter().map(|m| m.host.as_str()).collect();
    if ids.len() != config.members.len() || hosts.len() != config.members.len() {
        return Err("member ids and hosts must be unique".to_string());
    }
    Ok(())
}

/// Shared handle to a simulated cluster.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl SimulatedCluster {
    /// An empty, uninitialized cluster reachable on every address.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster whose replica set is already initialized with `config`.
    pub fn with_replica_set(config: ReplicaSetConfig) -> Self {
        let cluster = Self::new();
        cluster.lock().replica_set = Some(config);
        cluster
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a fault for the next command named `command`.
    pub fn inject(&self, command: &str, fault: Fault) {
        self.lock().faults.push_back((command.to_string(), fault));
    }

    pub fn mark_unreachable(&self, address: &str) {
        self.lock().unreachable.insert(address.to_string());
    }

    pub fn mark_reachable(&self, address: &str) {
        self.lock().unreachable.remove(address);
    }

    /// Allow `count` more connections; every later attempt is refused.
    pub fn limit_connections(&self, count: usize) {
        self.lock().connection_budget = Some(count);
    }

    /// Make `address` the only writable primary.
    pub fn set_primary(&self, address: &str) {
        self.lock().primary = Some(address.to_string());
    }

    pub fn replica_set(&self) -> Option<ReplicaSetConfig> {
        self.lock().replica_set.clone()
    }

    /// Overwrite the replica-set configuration, as a sibling run would.
    pub fn set_replica_set(&self, config: ReplicaSetConfig) {
        self.lock().replica_set = Some(config);
    }

    pub fn shards(&self) -> Vec<String> {
        self.lock().shards.clone()
    }

    pub fn sharded_databases(&self) -> Vec<String> {
        self.lock().sharded_databases.iter().cloned().collect()
    }

    pub fn sharded_collections(&self) -> BTreeMap<String, BTreeMap<String, i32>> {
        self.lock().sharded_collections.clone()
    }

    /// Every command received, in order.
    pub fn commands(&self) -> Vec<AdminCommand> {
        self.lock().commands.clone()
    }

    /// Number of received commands named `command`.
    pub fn count(&self, command: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.name() == command)
            .count()
    }

    /// Addresses of every successful connection, in order.
    pub fn connections(&self) -> Vec<String> {
        self.lock().connections.clone()
    }

    /// Sessions opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    fn open(&self, address: &str) -> ConnectorResult<Box<dyn AdminSession>> {
        let mut state = self.lock();
        if state.unreachable.contains(address) {
            return Err(ConnectorError::connection_failed(format!(
                "{}: connection refused",
                address
            )));
        }
        if let Some(budget) = state.connection_budget.as_mut() {
            if *budget == 0 {
                return Err(ConnectorError::connection_failed(format!(
                    "{}: connection refused",
                    address
                )));
            }
            *budget -= 1;
        }
        state.connections.push(address.to_string());
        state.open_sessions += 1;
        Ok(Box::new(SimulatedSession {
            cluster: self.clone(),
            address: address.to_string(),
        }))
    }
}

impl ClusterConnector for SimulatedCluster {
    fn connect(&self, target: &ConnectTarget) -> ConnectorResult<Box<dyn AdminSession>> {
        match target {
            ConnectTarget::Single(address) => self.open(address),
            ConnectTarget::ReplicaSet(hosts) => connect_replica_set(hosts, |host| self.open(host)),
        }
    }
}

struct SimulatedSession {
    cluster: SimulatedCluster,
    address: String,
}

impl AdminSession for SimulatedSession {
    fn address(&self) -> &str {
        &self.address
    }

    fn run_command(&mut self, command: &AdminCommand) -> ConnectorResult<CommandReply> {
        let mut state = self.cluster.lock();
        state.commands.push(command.clone());

        let timeout = || {
            ConnectorError::operation_timeout(format!(
                "{}: {} timed out",
                self.address,
                command.name()
            ))
        };
        let dropped = || {
            ConnectorError::connection_failed(format!(
                "{}: connection dropped during {}",
                self.address,
                command.name()
            ))
        };

        match state.take_fault(command.name()) {
            None => Ok(state.apply(&self.address, command)),
            Some(Fault::Timeout) => Err(timeout()),
            Some(Fault::TimeoutAfterApply) => {
                state.apply(&self.address, command);
                Err(timeout())
            }
            Some(Fault::DropConnection) => Err(dropped()),
            Some(Fault::DropConnectionAfterApply) => {
                state.apply(&self.address, command);
                Err(dropped())
            }
            Some(Fault::Reply(reply)) => Ok(reply),
        }
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        let mut state = self.cluster.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ReplicaSetMember;

    fn rs0(version: u64) -> ReplicaSetConfig {
        ReplicaSetConfig {
            id: "rs0".to_string(),
            version,
            members: vec![ReplicaSetMember::new(0, "a:27017")],
        }
    }

    fn session(cluster: &SimulatedCluster) -> Box<dyn AdminSession> {
        cluster.connect(&ConnectTarget::localhost(27017)).unwrap()
    }

    #[test]
    fn test_initiate_twice_reports_already_initialized() {
        let cluster = SimulatedCluster::new();
        let mut s = session(&cluster);
        let cmd = AdminCommand::ReplSetInitiate { config: rs0(1) };

        assert!(s.run_command(&cmd).unwrap().is_ok());
        assert!(s.run_command(&cmd).unwrap().reports(ALREADY_INITIALIZED));
    }

    #[test]
    fn test_reconfig_requires_higher_version() {
        let cluster = SimulatedCluster::with_replica_set(rs0(3));
        let mut s = session(&cluster);

        let stale = s.run_command(&AdminCommand::ReplSetReconfig { config: rs0(3) }).unwrap();
        assert!(!stale.is_ok());

        let next = s.run_command(&AdminCommand::ReplSetReconfig { config: rs0(4) }).unwrap();
        assert!(next.is_ok());
        assert_eq!(cluster.replica_set().unwrap().version, 4);
    }

    #[test]
    fn test_fault_applies_then_drops() {
        let cluster = SimulatedCluster::with_replica_set(rs0(1));
        cluster.inject("replSetReconfig", Fault::DropConnectionAfterApply);
        let mut s = session(&cluster);

        let err = s.run_command(&AdminCommand::ReplSetReconfig { config: rs0(2) }).unwrap_err();
        assert!(err.is_connection_failure());
        assert_eq!(cluster.replica_set().unwrap().version, 2);
    }

    #[test]
    fn test_faults_are_consumed_in_order() {
        let cluster = SimulatedCluster::new();
        cluster.inject("enablesharding", Fault::Timeout);
        let mut s = session(&cluster);
        let cmd = AdminCommand::EnableSharding { database: "app".into() };

        assert!(s.run_command(&cmd).unwrap_err().is_timeout());
        assert!(s.run_command(&cmd).unwrap().is_ok());
        assert_eq!(cluster.sharded_databases(), vec!["app"]);
    }

    #[test]
    fn test_sessions_released_on_drop() {
        let cluster = SimulatedCluster::new();
        {
            let _a = session(&cluster);
            let _b = session(&cluster);
            assert_eq!(cluster.open_sessions(), 2);
        }
        assert_eq!(cluster.open_sessions(), 0);
    }

    #[test]
    fn test_connection_budget() {
        let cluster = SimulatedCluster::new();
        cluster.limit_connections(1);
        let _first = session(&cluster);
        let second = cluster.connect(&ConnectTarget::localhost(27017));
        assert!(second.err().is_some_and(|e| e.is_connection_failure()));
    }
}
