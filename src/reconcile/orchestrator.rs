//! Provisioning run
//!
//! Supplies candidate nodes and the desired sharding map to the three
//! reconcilers, strictly in order: replica set, shards, collections.
//! Fatal errors abort before the next mutation; everything else is
//! collected into the run report.

use serde::Serialize;
use uuid::Uuid;

use crate::connector::{ClusterConnector, ConnectTarget};
use crate::observability::{log_event_with_fields, Event, Logger, ObservationScope};
use crate::topology::ShardedCollectionSpec;

use super::collections::CollectionShardingPlanner;
use super::discovery::NodeDiscovery;
use super::errors::{ReconcileError, ReconcileResult};
use super::outcome::{ReplicaSetOutcome, ShardOutcome, ShardingOutcome};
use super::replica_set::ReplicaSetReconciler;
use super::settings::{InstanceType, RunSettings};
use super::shards::ShardRegistrar;

/// Accepted config-server counts for the routing layer.
pub const VALID_CONFIG_SERVER_COUNTS: [usize; 2] = [1, 3];

/// Replica-set phase result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaSetReport {
    pub name: String,
    pub outcome: ReplicaSetOutcome,
}

/// Everything a run did, serialized as the CLI's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub node_name: String,
    pub instance_type: InstanceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<ReplicaSetReport>,
    pub shards: Vec<ShardOutcome>,
    pub sharding: Vec<ShardingOutcome>,
    pub failed: bool,
}

impl RunReport {
    fn new(run_id: String, settings: &RunSettings) -> Self {
        Self {
            run_id,
            node_name: settings.node_name.clone(),
            instance_type: settings.instance_type,
            replica_set: None,
            shards: Vec::new(),
            sharding: Vec::new(),
            failed: false,
        }
    }

    /// Whether any outcome is `Failed`. Pending and already-applied
    /// outcomes never fail a run.
    pub fn has_failures(&self) -> bool {
        self.replica_set.as_ref().is_some_and(|r| r.outcome.is_failed())
            || self.shards.iter().any(|s| s.status.is_failed())
            || self.sharding.iter().any(|s| s.status.is_failed())
    }
}

/// One provisioning run.
pub struct ProvisioningRun<'a> {
    settings: RunSettings,
    connector: &'a dyn ClusterConnector,
    discovery: &'a dyn NodeDiscovery,
}

impl<'a> ProvisioningRun<'a> {
    pub fn new(
        settings: RunSettings,
        connector: &'a dyn ClusterConnector,
        discovery: &'a dyn NodeDiscovery,
    ) -> Self {
        Self {
            settings,
            connector,
            discovery,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Execute the run under a fresh run id.
    pub fn execute(&self) -> ReconcileResult<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        Logger::set_run_id(Some(&run_id));

        let instance_type = self.settings.instance_type.as_str();
        log_event_with_fields(
            Event::RunStart,
            &[("node", self.settings.node_name.as_str()), ("instance_type", instance_type)],
        );

        let result = self.phases(RunReport::new(run_id, &self.settings));
        match &result {
            Ok(report) if report.failed => log_event_with_fields(Event::RunFailed, &[]),
            Ok(_) => log_event_with_fields(Event::RunComplete, &[]),
            Err(e) => log_event_with_fields(Event::RunFailed, &[("error", e.to_string().as_str())]),
        }
        Logger::set_run_id(None);
        result
    }

    fn phases(&self, mut report: RunReport) -> ReconcileResult<RunReport> {
        let settings = &self.settings;
        let collections = ShardedCollectionSpec::parse_all(&settings.sharded_collections)?;

        if settings.instance_type.is_router() {
            check_config_servers(self.discovery, settings)?;
        }

        if let Some(name) = &settings.replica_set_name {
            report.replica_set = Some(self.replica_set_phase(name)?);
        }

        if settings.instance_type.is_router() {
            report.shards = self.shards_phase()?;
            if !collections.is_empty() {
                report.sharding = self.collections_phase()?;
            }
        }

        report.failed = report.has_failures();
        Ok(report)
    }

    fn replica_set_phase(&self, name: &str) -> ReconcileResult<ReplicaSetReport> {
        let scope = ObservationScope::new("REPLICA_SET");
        let candidates = self.discovery.list_nodes(&self.settings.replica_set_query())?;
        let count = candidates.len().to_string();
        log_event_with_fields(
            Event::NodesDiscovered,
            &[("query", "replicaset"), ("count", count.as_str())],
        );

        let outcome = ReplicaSetReconciler::new(self.connector, self.settings.port)
            .solo(self.settings.solo)
            .reconcile(name, &candidates)?;

        match &outcome {
            ReplicaSetOutcome::Failed { reason } => scope.fail(reason),
            other => scope.complete(&[("status", other.status())]),
        }
        Ok(ReplicaSetReport {
            name: name.to_string(),
            outcome,
        })
    }

    fn shards_phase(&self) -> ReconcileResult<Vec<ShardOutcome>> {
        let scope = ObservationScope::new("SHARDS");
        let shard_nodes = self.discovery.list_nodes(&self.settings.shard_query())?;
        let count = shard_nodes.len().to_string();
        log_event_with_fields(
            Event::NodesDiscovered,
            &[("query", "shard"), ("count", count.as_str())],
        );

        let outcomes =
            ShardRegistrar::new(self.connector, self.router()).register_shards(&shard_nodes);
        let failures = outcomes.iter().filter(|o| o.status.is_failed()).count();
        close_scope(scope, failures, outcomes.len());
        Ok(outcomes)
    }

    fn collections_phase(&self) -> ReconcileResult<Vec<ShardingOutcome>> {
        let scope = ObservationScope::new("COLLECTIONS");
        let outcomes = CollectionShardingPlanner::new(self.connector, self.router())
            .plan_sharding(&self.settings.sharded_collections)?;
        let failures = outcomes.iter().filter(|o| o.status.is_failed()).count();
        close_scope(scope, failures, outcomes.len());
        Ok(outcomes)
    }

    fn router(&self) -> ConnectTarget {
        ConnectTarget::localhost(self.settings.port)
    }
}

fn close_scope(scope: ObservationScope, failed: usize, total: usize) {
    if failed > 0 {
        scope.fail(&format!("{} of {} item(s) failed", failed, total));
    } else {
        let total = total.to_string();
        scope.complete(&[("items", total.as_str())]);
    }
}

/// Routing layer requires exactly 1 or 3 config servers.
pub(crate) fn check_config_servers(
    discovery: &dyn NodeDiscovery,
    settings: &RunSettings,
) -> ReconcileResult<usize> {
    let count = discovery.list_nodes(&settings.config_server_query())?.len();
    if !VALID_CONFIG_SERVER_COUNTS.contains(&count) {
        let found = count.to_string();
        log_event_with_fields(Event::ConfigServerCountInvalid, &[("found", found.as_str())]);
        return Err(ReconcileError::WrongConfigServerCount(count));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::SimulatedCluster;
    use crate::reconcile::StaticInventory;
    use crate::topology::{ClusterNode, NodeRole};

    fn config_servers(count: usize) -> Vec<ClusterNode> {
        (0..count)
            .map(|i| {
                let name = format!("cfg{}", i);
                let fqdn = format!("{}.cluster", name);
                ClusterNode::new(name, fqdn, "10.0.1.1", 27019)
                    .with_roles(&[NodeRole::Configserver])
            })
            .collect()
    }

    #[test]
    fn test_router_rejects_two_config_servers_before_mutating() {
        let cluster = SimulatedCluster::new();
        let inventory = StaticInventory::new(config_servers(2));
        let settings = RunSettings::new("router", InstanceType::Mongos);

        let err = ProvisioningRun::new(settings, &cluster, &inventory).execute().unwrap_err();
        assert_eq!(err, ReconcileError::WrongConfigServerCount(2));
        assert!(cluster.commands().is_empty());
    }

    #[test]
    fn test_router_accepts_one_or_three_config_servers() {
        for count in [1, 3] {
            let cluster = SimulatedCluster::new();
            let inventory = StaticInventory::new(config_servers(count));
            let settings = RunSettings::new("router", InstanceType::Mongos);

            let report = ProvisioningRun::new(settings, &cluster, &inventory).execute().unwrap();
            assert!(!report.failed);
            assert!(report.replica_set.is_none());
        }
    }

    #[test]
    fn test_unreplicated_mongod_does_nothing() {
        let cluster = SimulatedCluster::new();
        let inventory = StaticInventory::default();
        let settings = RunSettings::new("db1", InstanceType::Mongod);

        let report = ProvisioningRun::new(settings, &cluster, &inventory).execute().unwrap();
        assert!(report.replica_set.is_none());
        assert!(report.shards.is_empty());
        assert!(cluster.connections().is_empty());
    }

    #[test]
    fn test_invalid_collection_mapping_is_fatal_before_any_phase() {
        let cluster = SimulatedCluster::new();
        let inventory = StaticInventory::new(config_servers(1));
        let mut settings = RunSettings::new("router", InstanceType::Mongos);
        settings.sharded_collections.insert("bad".to_string(), "id".to_string());

        let err = ProvisioningRun::new(settings, &cluster, &inventory).execute().unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
        assert!(cluster.commands().is_empty());
    }
}
