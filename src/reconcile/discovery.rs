//! Node discovery
//!
//! Discovery is an injected collaborator: given a query it returns the
//! candidate nodes, assumed correct. `StaticInventory` answers queries from
//! a JSON inventory file:
//!
//! ```json
//! { "nodes": [ { "name": "a", "fqdn": "a.cluster", "ip_address": "10.0.0.1",
//!                "port": 27017, "cluster_name": "main", "shard_name": "s1",
//!                "roles": ["shard", "replicaset"] } ] }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::topology::{ClusterNode, NodeRole, DEFAULT_SHARD_NAME};

use super::errors::{ReconcileError, ReconcileResult};

/// Filter for a discovery query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeQuery {
    pub cluster_name: Option<String>,
    pub role: Option<NodeRole>,
    pub environment: Option<String>,
    pub shard_name: Option<String>,
}

impl NodeQuery {
    /// Nodes of `cluster_name` playing `role`.
    pub fn role(cluster_name: Option<&str>, role: NodeRole) -> Self {
        Self {
            cluster_name: cluster_name.map(str::to_string),
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn in_environment(mut self, environment: &str) -> Self {
        if !environment.is_empty() {
            self.environment = Some(environment.to_string());
        }
        self
    }

    pub fn in_shard(mut self, shard_name: &str) -> Self {
        self.shard_name = Some(shard_name.to_string());
        self
    }

    pub fn matches(&self, node: &ClusterNode) -> bool {
        let cluster_ok = self
            .cluster_name
            .as_ref()
            .map_or(true, |c| node.cluster_name.as_ref() == Some(c));
        let role_ok = self.role.map_or(true, |r| node.has_role(r));
        let environment_ok = self
            .environment
            .as_ref()
            .map_or(true, |e| &node.environment == e);
        let shard_ok = self
            .shard_name
            .as_ref()
            .map_or(true, |s| node.shard_name.as_deref().unwrap_or(DEFAULT_SHARD_NAME) == s);
        cluster_ok && role_ok && environment_ok && shard_ok
    }
}

/// `listNodes(query) -> [ClusterNode]`
pub trait NodeDiscovery {
    fn list_nodes(&self, query: &NodeQuery) -> ReconcileResult<Vec<ClusterNode>>;
}

#[derive(Deserialize)]
struct InventoryFile {
    #[serde(default)]
    nodes: Vec<Value>,
}

/// Discovery backed by a fixed node list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticInventory {
    nodes: Vec<ClusterNode>,
}

impl StaticInventory {
    pub fn new(nodes: Vec<ClusterNode>) -> Self {
        Self { nodes }
    }

    /// Load an inventory file.
    ///
    /// An unknown role is reported as `InvalidShardType`; every other
    /// problem with the file is a `Discovery` error.
    pub fn load(path: &Path) -> ReconcileResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Discovery(format!("cannot read inventory {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| match e {
                ReconcileError::Discovery(msg) => {
                    ReconcileError::Discovery(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })
    }

    /// Parse inventory JSON.
    pub fn parse(content: &str) -> ReconcileResult<Self> {
        let file: InventoryFile = serde_json::from_str(content)
            .map_err(|e| ReconcileError::Discovery(format!("invalid inventory JSON: {}", e)))?;

        let mut nodes = Vec::with_capacity(file.nodes.len());
        for raw in file.nodes {
            if let Some(roles) = raw.get("roles").and_then(Value::as_array) {
                for role in roles.iter().filter_map(Value::as_str) {
                    role.parse::<NodeRole>()?;
                }
            }
            let node: ClusterNode = serde_json::from_value(raw)
                .map_err(|e| ReconcileError::Discovery(format!("invalid node entry: {}", e)))?;
            nodes.push(node);
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }
}

impl NodeDiscovery for StaticInventory {
    fn list_nodes(&self, query: &NodeQuery) -> ReconcileResult<Vec<ClusterNode>> {
        Ok(self.nodes.iter().filter(|n| query.matches(n)).cloned().collect())
    }
}
