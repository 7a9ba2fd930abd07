//! Run settings
//!
//! Built once at the process boundary from the configuration file and
//! passed by value. Everything a run needs to decide which phases apply is
//! resolved here, including the replica-set name.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::topology::{replica_set_name_for_shard, NodeRole, DEFAULT_PORT, DEFAULT_SHARD_NAME};

use super::discovery::NodeQuery;
use super::errors::ReconcileError;

/// Kind of daemon this node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InstanceType {
    /// Plain or replicated data-bearing daemon
    Mongod,
    /// Shard-bearing daemon
    Shard,
    /// Config server
    Configserver,
    /// Routing layer
    Mongos,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Mongod => "mongod",
            InstanceType::Shard => "shard",
            InstanceType::Configserver => "configserver",
            InstanceType::Mongos => "mongos",
        }
    }

    /// Whether this instance is the routing layer.
    pub fn is_router(&self) -> bool {
        matches!(self, InstanceType::Mongos)
    }

    /// Resolve the replica-set name this instance reconciles, if any.
    ///
    /// A shard replicates under `rs_<shard_name>` and ignores an explicit
    /// name. Other data-bearing instances use the explicit name, falling
    /// back to `rs_<shard_name>` when replicated. The routing layer never
    /// belongs to a replica set.
    pub fn resolve_replica_set_name(
        &self,
        replicated: bool,
        explicit: Option<&str>,
        shard_name: &str,
    ) -> Option<String> {
        let explicit = explicit.map(str::trim).filter(|name| !name.is_empty());
        match self {
            InstanceType::Mongos => None,
            InstanceType::Shard => replicated.then(|| replica_set_name_for_shard(shard_name)),
            InstanceType::Mongod | InstanceType::Configserver => match explicit {
                Some(name) => Some(name.to_string()),
                None => replicated.then(|| replica_set_name_for_shard(shard_name)),
            },
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mongod" => Ok(InstanceType::Mongod),
            "shard" => Ok(InstanceType::Shard),
            "configserver" => Ok(InstanceType::Configserver),
            "mongos" => Ok(InstanceType::Mongos),
            other => Err(ReconcileError::InvalidShardType(other.to_string())),
        }
    }
}

impl TryFrom<String> for InstanceType {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceType> for String {
    fn from(instance_type: InstanceType) -> Self {
        instance_type.as_str().to_string()
    }
}

/// Everything one provisioning run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub node_name: String,
    pub cluster_name: Option<String>,
    pub environment: String,
    pub instance_type: InstanceType,
    /// Port of the local daemon (or local router)
    pub port: u16,
    /// Resolved replica-set name; `None` skips replica-set reconciliation
    pub replica_set_name: Option<String>,
    pub shard_name: String,
    /// Whether an empty member list is fatal
    pub solo: bool,
    /// `db.collection` → shard key
    pub sharded_collections: BTreeMap<String, String>,
}

impl RunSettings {
    /// Settings for `node_name` with defaults everywhere else.
    pub fn new(node_name: impl Into<String>, instance_type: InstanceType) -> Self {
        Self {
            node_name: node_name.into(),
            cluster_name: None,
            environment: String::new(),
            instance_type,
            port: DEFAULT_PORT,
            replica_set_name: None,
            shard_name: DEFAULT_SHARD_NAME.to_string(),
            solo: false,
            sharded_collections: BTreeMap::new(),
        }
    }

    /// Siblings of this node's replica set: same cluster, environment and
    /// shard name, whatever the instance type.
    pub fn replica_set_query(&self) -> NodeQuery {
        NodeQuery::role(self.cluster_name.as_deref(), NodeRole::Replicaset)
            .in_environment(&self.environment)
            .in_shard(&self.shard_name)
    }

    /// Shard-bearing nodes of the cluster.
    pub fn shard_query(&self) -> NodeQuery {
        NodeQuery::role(self.cluster_name.as_deref(), NodeRole::Shard)
            .in_environment(&self.environment)
    }

    /// Config servers of the cluster.
    pub fn config_server_query(&self) -> NodeQuery {
        NodeQuery::role(self.cluster_name.as_deref(), NodeRole::Configserver)
            .in_environment(&self.environment)
    }
}
