//! Observable reconciliation events
//!
//! Every event carries a fixed severity:
//! - INFO: configured, already configured, no-op
//! - WARN: deferred, timed out, unreachable
//! - ERROR: command failure
//! - FATAL: run cannot continue

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Provisioning run begins
    RunStart,
    /// Provisioning run finished without Failed outcomes
    RunComplete,
    /// Provisioning run finished with Failed outcomes
    RunFailed,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Discovery returned candidate nodes
    NodesDiscovered,
    /// Routing layer has the wrong number of config servers
    ConfigServerCountInvalid,

    // Connections
    /// Target could not be reached
    ConnectionFailed,

    // Replica set
    /// Discovery returned no members
    ReplicaSetNoMembers,
    /// Desired membership computed, initiate about to be issued
    ReplicaSetConfiguring,
    /// Initiate succeeded
    ReplicaSetInitiated,
    /// Initiate timed out, convergence deferred
    ReplicaSetInitiatePending,
    /// Reading the live config timed out, convergence deferred
    ReplicaSetFetchPending,
    /// Live config already matches
    ReplicaSetAlreadyConfigured,
    /// Live config uses IP addresses, rewriting to hostnames
    ReplicaSetHostnameMigration,
    /// Live membership drifted, applying member diff
    ReplicaSetMemberDiff,
    /// Reconfig acknowledged
    ReplicaSetReconfigured,
    /// Reconfig timed out, convergence deferred
    ReplicaSetReconfigPending,
    /// Connection lost during reconfig; verified by re-reading
    ReplicaSetReconfigVerified,
    /// Replica set reconciliation failed
    ReplicaSetFailed,

    // Shards
    /// Shard nodes grouped into shard specs
    ShardsGrouped,
    /// Shard registered
    ShardAdded,
    /// Shard was already registered
    ShardAlreadyRegistered,
    /// addShard timed out
    ShardAddPending,
    /// addShard failed
    ShardAddFailed,

    // Databases and collections
    /// Sharding enabled for a database
    ShardingEnabled,
    /// Sharding was already enabled
    ShardingAlreadyEnabled,
    /// enablesharding timed out
    ShardingEnablePending,
    /// enablesharding failed
    ShardingEnableFailed,
    /// Collection sharded
    CollectionSharded,
    /// Collection was already sharded
    CollectionAlreadySharded,
    /// shardcollection timed out
    CollectionShardPending,
    /// shardcollection failed
    CollectionShardFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunStart => "RUN_BEGIN",
            Event::RunComplete => "RUN_COMPLETE",
            Event::RunFailed => "RUN_FAILED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::NodesDiscovered => "NODES_DISCOVERED",
            Event::ConfigServerCountInvalid => "CONFIG_SERVER_COUNT_INVALID",

            Event::ConnectionFailed => "CONNECTION_FAILED",

            Event::ReplicaSetNoMembers => "REPLICA_SET_NO_MEMBERS",
            Event::ReplicaSetConfiguring => "REPLICA_SET_CONFIGURING",
            Event::ReplicaSetInitiated => "REPLICA_SET_INITIATED",
            Event::ReplicaSetInitiatePending => "REPLICA_SET_INITIATE_PENDING",
            Event::ReplicaSetFetchPending => "REPLICA_SET_FETCH_PENDING",
            Event::ReplicaSetAlreadyConfigured => "REPLICA_SET_ALREADY_CONFIGURED",
            Event::ReplicaSetHostnameMigration => "REPLICA_SET_HOSTNAME_MIGRATION",
            Event::ReplicaSetMemberDiff => "REPLICA_SET_MEMBER_DIFF",
            Event::ReplicaSetReconfigured => "REPLICA_SET_RECONFIGURED",
            Event::ReplicaSetReconfigPending => "REPLICA_SET_RECONFIG_PENDING",
            Event::ReplicaSetReconfigVerified => "REPLICA_SET_RECONFIG_VERIFIED",
            Event::ReplicaSetFailed => "REPLICA_SET_FAILED",

            Event::ShardsGrouped => "SHARDS_GROUPED",
            Event::ShardAdded => "SHARD_ADDED",
            Event::ShardAlreadyRegistered => "SHARD_ALREADY_REGISTERED",
            Event::ShardAddPending => "SHARD_ADD_PENDING",
            Event::ShardAddFailed => "SHARD_ADD_FAILED",

            Event::ShardingEnabled => "SHARDING_ENABLED",
            Event::ShardingAlreadyEnabled => "SHARDING_ALREADY_ENABLED",
            Event::ShardingEnablePending => "SHARDING_ENABLE_PENDING",
            Event::ShardingEnableFailed => "SHARDING_ENABLE_FAILED",
            Event::CollectionSharded => "COLLECTION_SHARDED",
            Event::CollectionAlreadySharded => "COLLECTION_ALREADY_SHARDED",
            Event::CollectionShardPending => "COLLECTION_SHARD_PENDING",
            Event::CollectionShardFailed => "COLLECTION_SHARD_FAILED",
        }
    }

    /// Severity the event is always logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ConfigServerCountInvalid => Severity::Fatal,

            Event::RunFailed
            | Event::ReplicaSetFailed
            | Event::ShardAddFailed
            | Event::ShardingEnableFailed
            | Event::CollectionShardFailed => Severity::Error,

            Event::ConnectionFailed
            | Event::ReplicaSetNoMembers
            | Event::ReplicaSetInitiatePending
            | Event::ReplicaSetFetchPending
            | Event::ReplicaSetReconfigPending
            | Event::ShardAddPending
            | Event::ShardingEnablePending
            | Event::CollectionShardPending => Severity::Warn,

            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::RunStart,
            Event::ConnectionFailed,
            Event::ReplicaSetHostnameMigration,
            Event::ShardAlreadyRegistered,
            Event::CollectionShardPending,
        ];
        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Event::ReplicaSetAlreadyConfigured.severity(), Severity::Info);
        assert_eq!(Event::ShardAddPending.severity(), Severity::Warn);
        assert_eq!(Event::ConnectionFailed.severity(), Severity::Warn);
        assert_eq!(Event::CollectionShardFailed.severity(), Severity::Error);
        assert!(Event::ConfigServerCountInvalid.is_fatal());
        assert!(!Event::ReplicaSetFailed.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::ReplicaSetInitiated), "REPLICA_SET_INITIATED");
    }
}
