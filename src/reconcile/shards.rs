//! Shard registration with the routing layer
//!
//! Each shard spec is submitted once per run. A duplicate registration is
//! reported by the routing layer as "already ..." and counts as applied.

use crate::connector::{AdminCommand, ClusterConnector, ConnectTarget};
use crate::observability::{log_event_with_fields, Event};
use crate::topology::{group_shard_nodes, ClusterNode};

use super::outcome::{ItemStatus, ShardOutcome};
use super::router::{Routed, RouterSession};

/// Registers shard specs with one routing-layer endpoint.
pub struct ShardRegistrar<'a> {
    connector: &'a dyn ClusterConnector,
    router: ConnectTarget,
}

impl<'a> ShardRegistrar<'a> {
    pub fn new(connector: &'a dyn ClusterConnector, router: ConnectTarget) -> Self {
        Self { connector, router }
    }

    /// Group `shard_nodes` into shard specs and register each one.
    ///
    /// Items are independent: a rejected spec is logged and the next one is
    /// still submitted. Once the routing layer is unreachable the remaining
    /// specs are reported `ConnectionFailed` without being sent.
    pub fn register_shards(&self, shard_nodes: &[ClusterNode]) -> Vec<ShardOutcome> {
        let descriptors = group_shard_nodes(shard_nodes);
        let count = descriptors.len().to_string();
        log_event_with_fields(Event::ShardsGrouped, &[("shards", count.as_str())]);

        let mut router = RouterSession::new(self.connector, self.router.clone());
        descriptors
            .iter()
            .map(|descriptor| {
                let spec = descriptor.spec();
                let routed = router.run(&AdminCommand::AddShard {
                    shard: spec.to_string(),
                });
                classify(spec, routed)
            })
            .collect()
    }
}

fn classify(spec: &str, routed: Routed) -> ShardOutcome {
    match routed {
        Routed::Reply(reply) if reply.is_ok() => {
            let name = reply.shard_added.as_deref().unwrap_or(spec);
            log_event_with_fields(Event::ShardAdded, &[("shard", spec), ("name", name)]);
            ShardOutcome::new(spec, ItemStatus::Applied)
        }
        Routed::Reply(reply) if reply.reports_existing_shard() => {
            log_event_with_fields(Event::ShardAlreadyRegistered, &[("shard", spec)]);
            ShardOutcome::new(spec, ItemStatus::AlreadyApplied)
        }
        Routed::Reply(reply) => {
            let reason = reply.error_message().to_string();
            log_event_with_fields(
                Event::ShardAddFailed,
                &[("shard", spec), ("reason", reason.as_str())],
            );
            ShardOutcome::new(spec, ItemStatus::Failed).with_detail(reason)
        }
        Routed::Timeout(reason) => {
            log_event_with_fields(
                Event::ShardAddPending,
                &[("shard", spec), ("reason", reason.as_str())],
            );
            ShardOutcome::new(spec, ItemStatus::Pending).with_detail(reason)
        }
        Routed::Unreachable(reason) => {
            ShardOutcome::new(spec, ItemStatus::ConnectionFailed).with_detail(reason)
        }
    }
}
