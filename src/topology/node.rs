//! Discovered cluster nodes
//!
//! A `ClusterNode` is what the discovery collaborator hands us. It is never
//! mutated during a run; desired state is always derived from a sorted copy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileError;

/// Default database port.
pub const DEFAULT_PORT: u16 = 27017;

/// Shard name used when a node does not declare one.
pub const DEFAULT_SHARD_NAME: &str = "default";

/// Derive the replica-set name of a replicated shard.
pub fn replica_set_name_for_shard(shard_name: &str) -> String {
    format!("rs_{}", shard_name)
}

/// Role a node plays in the cluster.
///
/// Roles are how discovery queries select siblings. An unknown role in an
/// inventory is an input error and surfaces as `InvalidShardType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeRole {
    /// Plain data-bearing daemon
    Mongod,
    /// Member of a replica set
    Replicaset,
    /// Shard-bearing daemon
    Shard,
    /// Config server
    Configserver,
    /// Routing layer
    Mongos,
}

impl NodeRole {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Mongod => "mongod",
            NodeRole::Replicaset => "replicaset",
            NodeRole::Shard => "shard",
            NodeRole::Configserver => "configserver",
            NodeRole::Mongos => "mongos",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mongod" => Ok(NodeRole::Mongod),
            "replicaset" => Ok(NodeRole::Replicaset),
            "shard" => Ok(NodeRole::Shard),
            "configserver" => Ok(NodeRole::Configserver),
            "mongos" => Ok(NodeRole::Mongos),
            other => Err(ReconcileError::InvalidShardType(other.to_string())),
        }
    }
}

impl TryFrom<String> for NodeRole {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeRole> for String {
    fn from(role: NodeRole) -> Self {
        role.as_str().to_string()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// A node descriptor produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Node name, used for stable ordering
    pub name: String,

    /// Fully qualified domain name
    pub fqdn: String,

    /// Primary IP address
    pub ip_address: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether the node belongs to a replica set
    #[serde(default)]
    pub is_replica_set_member: bool,

    /// Explicit replica-set name, if configured
    #[serde(default)]
    pub replica_set_name: Option<String>,

    /// Deployment environment
    #[serde(default)]
    pub environment: String,

    /// Cluster the node belongs to
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Shard the node serves, if any
    #[serde(default)]
    pub shard_name: Option<String>,

    /// Roles the node plays
    #[serde(default)]
    pub roles: Vec<NodeRole>,
}

impl ClusterNode {
    /// Create a standalone node with no roles.
    pub fn new(
        name: impl Into<String>,
        fqdn: impl Into<String>,
        ip_address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            fqdn: fqdn.into(),
            ip_address: ip_address.into(),
            port,
            is_replica_set_member: false,
            replica_set_name: None,
            environment: String::new(),
            cluster_name: None,
            shard_name: None,
            roles: Vec::new(),
        }
    }

    /// Mark the node as a member of the named replica set.
    pub fn with_replica_set(mut self, name: impl Into<String>) -> Self {
        self.is_replica_set_member = true;
        self.replica_set_name = Some(name.into());
        self
    }

    /// Set the shard name.
    pub fn with_shard_name(mut self, shard_name: impl Into<String>) -> Self {
        self.shard_name = Some(shard_name.into());
        self
    }

    /// Set the cluster name.
    pub fn with_cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster_name.into());
        self
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Set the roles.
    pub fn with_roles(mut self, roles: &[NodeRole]) -> Self {
        self.roles = roles.to_vec();
        self
    }

    /// `fqdn:port`, the canonical member address.
    pub fn host_address(&self) -> String {
        format!("{}:{}", self.fqdn, self.port)
    }

    /// `ip:port`, the address form used by early configurations.
    pub fn ip_host_address(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }

    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }

    /// Replica-set name this node replicates under.
    ///
    /// Returns `None` for nodes outside any replica set. A node is a member
    /// when flagged as one or when it carries the `replicaset` role. Members
    /// without an explicit name fall back to `rs_<shard_name>`.
    pub fn resolved_replica_set_name(&self) -> Option<String> {
        if !self.is_replica_set_member && !self.has_role(NodeRole::Replicaset) {
            return None;
        }
        match &self.replica_set_name {
            Some(name) if !name.trim().is_empty() => Some(name.clone()),
            _ => Some(replica_set_name_for_shard(
                self.shard_name.as_deref().unwrap_or(DEFAULT_SHARD_NAME),
            )),
        }
    }
}

/// Sort nodes by name, falling back to fqdn so equal names stay stable.
pub fn sort_by_name(nodes: &mut [ClusterNode]) {
    nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.fqdn.cmp(&b.fqdn)));
}
