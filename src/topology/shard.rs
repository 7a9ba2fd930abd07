//! Shard descriptors
//!
//! A shard is either a single standalone node (`host:port`) or a whole
//! replica set (`name/host:port,host:port`). Descriptors are recomputed from
//! discovery on every run and never stored locally.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::{sort_by_name, ClusterNode};

/// Shard spec as submitted to `addShard`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardDescriptor {
    shard_spec: String,
}

impl ShardDescriptor {
    /// A standalone node shard.
    pub fn standalone(host: impl Into<String>) -> Self {
        Self {
            shard_spec: host.into(),
        }
    }

    /// A replica-set backed shard.
    pub fn replica_set(name: &str, hosts: &[String]) -> Self {
        Self {
            shard_spec: format!("{}/{}", name, hosts.join(",")),
        }
    }

    pub fn spec(&self) -> &str {
        &self.shard_spec
    }

    pub fn is_replica_set_backed(&self) -> bool {
        self.shard_spec.contains('/')
    }
}

impl fmt::Display for ShardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.shard_spec)
    }
}

/// Group shard-bearing nodes into shard descriptors.
///
/// Replica-set members are grouped by their resolved replica-set name, one
/// descriptor per group, groups in name order. Every other node becomes its
/// own standalone descriptor. Hosts inside a group follow node name order.
pub fn group_shard_nodes(nodes: &[ClusterNode]) -> Vec<ShardDescriptor> {
    let mut sorted = nodes.to_vec();
    sort_by_name(&mut sorted);

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut standalone: Vec<String> = Vec::new();
    for node in &sorted {
        let host = node.host_address();
        match node.resolved_replica_set_name() {
            Some(name) => {
                let hosts = groups.entry(name).or_default();
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
            None => {
                if !standalone.contains(&host) {
                    standalone.push(host);
                }
            }
        }
    }

    let mut descriptors: Vec<ShardDescriptor> = groups
        .iter()
        .map(|(name, hosts)| ShardDescriptor::replica_set(name, hosts))
        .collect();
    descriptors.extend(standalone.into_iter().map(ShardDescriptor::standalone));
    descriptors
}
