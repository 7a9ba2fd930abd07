//! shardkeeper - cluster topology reconciler for a replicated, sharded
//! document store
//!
//! Converges a live deployment toward the membership and sharding layout
//! computed from discovered nodes, safely across timeouts, partial progress
//! and re-runs.

pub mod cli;
pub mod connector;
pub mod observability;
pub mod reconcile;
pub mod topology;
