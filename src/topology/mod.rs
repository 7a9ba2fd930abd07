//! Cluster topology model
//!
//! Plain data describing the cluster as discovery reports it and as the
//! database reports it:
//! - `ClusterNode`: a discovered node, immutable for one run
//! - `ReplicaSetConfig`: the authoritative replica-set membership document
//! - `ShardDescriptor`: a shard spec accepted by the routing layer
//! - `ShardedCollectionSpec`: a desired `db.collection` → shard key directive
//!
//! Nothing here performs I/O. Desired state is computed from candidate
//! nodes and compared against live state fetched by the reconcilers.

mod namespace;
mod node;
mod replica_set;
mod shard;

pub use namespace::{distinct_databases, ShardedCollectionSpec};
pub use node::{
    replica_set_name_for_shard, sort_by_name, ClusterNode, NodeRole, DEFAULT_PORT,
    DEFAULT_SHARD_NAME,
};
pub use replica_set::{
    same_members, DesiredMembers, LiveComparison, MemberDiff, ReplicaSetConfig, ReplicaSetMember,
    INITIAL_VERSION,
};
pub use shard::{group_shard_nodes, ShardDescriptor};
