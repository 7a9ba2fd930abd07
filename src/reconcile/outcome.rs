//! Reconciliation outcomes
//!
//! Outcomes are values, not errors. Only `Failed` (and item-level `Failed`)
//! makes a run exit non-zero; pending and already-applied outcomes are safe
//! to re-enter on the next run.

use serde::Serialize;

use crate::topology::MemberDiff;

/// What the replica-set reconciler did to reach `ConfigCurrent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplicaSetAction {
    /// Initiate succeeded
    Initiated,
    /// Live config already matched
    Unchanged,
    /// Members were rewritten from IP addresses to hostnames
    HostnameMigration,
    /// Members were removed and added
    MemberDiff { removed: Vec<String>, added: Vec<String> },
}

impl From<MemberDiff> for ReplicaSetAction {
    fn from(diff: MemberDiff) -> Self {
        ReplicaSetAction::MemberDiff {
            removed: diff.removed,
            added: diff.added,
        }
    }
}

/// Result of one replica-set reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplicaSetOutcome {
    /// Live config matches the desired membership
    ConfigCurrent {
        /// Live version after the run, when known
        version: Option<u64>,
        action: ReplicaSetAction,
    },
    /// A mutation was started and timed out; re-check next run
    PendingConvergence { reason: String },
    /// Could not reach the cluster; nothing was done
    ConnectionFailed { target: String, reason: String },
    /// Discovery returned no candidates; nothing was done
    NoMembersFound,
    /// Unresolvable mismatch or command failure
    Failed { reason: String },
}

impl ReplicaSetOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReplicaSetOutcome::Failed { .. })
    }

    pub fn is_current(&self) -> bool {
        matches!(self, ReplicaSetOutcome::ConfigCurrent { .. })
    }

    /// Short status name for logs.
    pub fn status(&self) -> &'static str {
        match self {
            ReplicaSetOutcome::ConfigCurrent { .. } => "config_current",
            ReplicaSetOutcome::PendingConvergence { .. } => "pending_convergence",
            ReplicaSetOutcome::ConnectionFailed { .. } => "connection_failed",
            ReplicaSetOutcome::NoMembersFound => "no_members_found",
            ReplicaSetOutcome::Failed { .. } => "failed",
        }
    }
}

/// Per-item status for shard registration and collection sharding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Mutation acknowledged
    Applied,
    /// The cluster reported it was already in place
    AlreadyApplied,
    /// Timed out; started, re-check next run
    Pending,
    /// Routing layer unreachable; not attempted
    ConnectionFailed,
    /// Command error
    Failed,
}

impl ItemStatus {
    /// Applied or already applied.
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Applied | ItemStatus::AlreadyApplied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemStatus::Failed)
    }
}

/// Outcome of registering one shard spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardOutcome {
    pub spec: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ShardOutcome {
    pub fn new(spec: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            spec: spec.into(),
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// What a sharding outcome refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ShardingTarget {
    Database(String),
    Collection(String),
}

/// Outcome of enabling sharding on a database or sharding a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardingOutcome {
    pub target: ShardingTarget,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ShardingOutcome {
    pub fn database(name: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            target: ShardingTarget::Database(name.into()),
            status,
            detail: None,
        }
    }

    pub fn collection(namespace: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            target: ShardingTarget::Collection(namespace.into()),
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
