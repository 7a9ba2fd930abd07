//! Cluster topology reconciliation
//!
//! Converges a live deployment toward the desired topology:
//! - `ReplicaSetReconciler`: initiate, hostname migration, member diff
//! - `ShardRegistrar`: idempotent shard registration with the routing layer
//! - `CollectionShardingPlanner`: idempotent database and collection sharding
//! - `ProvisioningRun`: runs the three in order from discovered nodes
//!
//! No component keeps state between runs. The cluster is the state of
//! record; every run re-reads it, and every mutation is safe to repeat.

mod collections;
mod discovery;
mod errors;
mod orchestrator;
mod outcome;
mod plan;
mod replica_set;
mod router;
mod settings;
mod shards;

pub use collections::CollectionShardingPlanner;
pub use discovery::{NodeDiscovery, NodeQuery, StaticInventory};
pub use errors::{ReconcileError, ReconcileResult};
pub use orchestrator::{ProvisioningRun, ReplicaSetReport, RunReport, VALID_CONFIG_SERVER_COUNTS};
pub use outcome::{
    ItemStatus, ReplicaSetAction, ReplicaSetOutcome, ShardOutcome, ShardingOutcome, ShardingTarget,
};
pub use plan::{PlannedReplicaSet, TopologyPlan};
pub use replica_set::ReplicaSetReconciler;
pub use settings::{InstanceType, RunSettings};
pub use shards::ShardRegistrar;
