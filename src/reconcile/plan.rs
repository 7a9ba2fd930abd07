//! Offline topology plan
//!
//! Computes what a run would submit, from discovery alone, without opening
//! a connection.

use serde::Serialize;

use crate::topology::{
    distinct_databases, group_shard_nodes, DesiredMembers, ReplicaSetMember, ShardedCollectionSpec,
};

use super::discovery::NodeDiscovery;
use super::errors::ReconcileResult;
use super::orchestrator::check_config_servers;
use super::settings::{InstanceType, RunSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedReplicaSet {
    pub name: String,
    /// Members an initiate would carry
    pub members: Vec<ReplicaSetMember>,
}

/// Desired state for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyPlan {
    pub node_name: String,
    pub instance_type: InstanceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<PlannedReplicaSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_servers: Option<usize>,
    pub shards: Vec<String>,
    pub databases: Vec<String>,
    pub collections: Vec<ShardedCollectionSpec>,
}

impl TopologyPlan {
    /// Build the plan, applying the same fatal checks as a run.
    pub fn build(settings: &RunSettings, discovery: &dyn NodeDiscovery) -> ReconcileResult<Self> {
        let collections = ShardedCollectionSpec::parse_all(&settings.sharded_collections)?;

        let mut plan = Self {
            node_name: settings.node_name.clone(),
            instance_type: settings.instance_type,
            replica_set: None,
            config_servers: None,
            shards: Vec::new(),
            databases: Vec::new(),
            collections: Vec::new(),
        };

        if let Some(name) = &settings.replica_set_name {
            let candidates = discovery.list_nodes(&settings.replica_set_query())?;
            plan.replica_set = Some(PlannedReplicaSet {
                name: name.clone(),
                members: DesiredMembers::from_candidates(&candidates).by_host,
            });
        }

        if settings.instance_type.is_router() {
            plan.config_servers = Some(check_config_servers(discovery, settings)?);
            let shard_nodes = discovery.list_nodes(&settings.shard_query())?;
            plan.shards = group_shard_nodes(&shard_nodes)
                .iter()
                .map(|d| d.spec().to_string())
                .collect();
            plan.databases = distinct_databases(&collections);
            plan.collections = collections;
        }

        Ok(plan)
    }
}
