//! Collection sharding
//!
//! Enables sharding on every database named by the desired mapping, then
//! shards each collection on `{key: 1}`. Databases are processed before
//! collections; within each group items are independent.

use std::collections::BTreeMap;

use crate::connector::{
    AdminCommand, ClusterConnector, ConnectTarget, ALREADY_ENABLED, ALREADY_SHARDED,
};
use crate::observability::{log_event_with_fields, Event};
use crate::topology::{distinct_databases, ShardedCollectionSpec};

use super::errors::ReconcileResult;
use super::outcome::{ItemStatus, ShardingOutcome};
use super::router::{Routed, RouterSession};

/// Events for one kind of sharding command.
struct EventSet {
    applied: Event,
    already: Event,
    pending: Event,
    failed: Event,
    marker: &'static str,
}

const DATABASE_EVENTS: EventSet = EventSet {
    applied: Event::ShardingEnabled,
    already: Event::ShardingAlreadyEnabled,
    pending: Event::ShardingEnablePending,
    failed: Event::ShardingEnableFailed,
    marker: ALREADY_ENABLED,
};

const COLLECTION_EVENTS: EventSet = EventSet {
    applied: Event::CollectionSharded,
    already: Event::CollectionAlreadySharded,
    pending: Event::CollectionShardPending,
    failed: Event::CollectionShardFailed,
    marker: ALREADY_SHARDED,
};

pub struct CollectionShardingPlanner<'a> {
    connector: &'a dyn ClusterConnector,
    router: ConnectTarget,
}

impl<'a> CollectionShardingPlanner<'a> {
    pub fn new(connector: &'a dyn ClusterConnector, router: ConnectTarget) -> Self {
        Self { connector, router }
    }

    /// Apply `namespace → shard key`.
    ///
    /// Malformed entries are rejected before anything is sent.
    pub fn plan_sharding(
        &self,
        collections: &BTreeMap<String, String>,
    ) -> ReconcileResult<Vec<ShardingOutcome>> {
        let specs = ShardedCollectionSpec::parse_all(collections)?;
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        let mut router = RouterSession::new(self.connector, self.router.clone());
        let mut outcomes = Vec::with_capacity(specs.len() * 2);

        for database in distinct_databases(&specs) {
            let routed = router.run(&AdminCommand::EnableSharding {
                database: database.clone(),
            });
            let status = classify(&DATABASE_EVENTS, "database", &database, &routed);
            outcomes.push(with_detail(ShardingOutcome::database(database, status), routed));
        }

        for spec in &specs {
            let routed = router.run(&AdminCommand::ShardCollection {
                namespace: spec.namespace.clone(),
                key: spec.key_document(),
            });
            let status = classify(&COLLECTION_EVENTS, "namespace", &spec.namespace, &routed);
            outcomes.push(with_detail(
                ShardingOutcome::collection(spec.namespace.clone(), status),
                routed,
            ));
        }

        Ok(outcomes)
    }
}

fn classify(events: &EventSet, field: &str, name: &str, routed: &Routed) -> ItemStatus {
    match routed {
        Routed::Reply(reply) if reply.is_ok() => {
            log_event_with_fields(events.applied, &[(field, name)]);
            ItemStatus::Applied
        }
        Routed::Reply(reply) if reply.reports(events.marker) => {
            log_event_with_fields(events.already, &[(field, name)]);
            ItemStatus::AlreadyApplied
        }
        Routed::Reply(reply) => {
            log_event_with_fields(
                events.failed,
                &[(field, name), ("reason", reply.error_message())],
            );
            ItemStatus::Failed
        }
        Routed::Timeout(reason) => {
            log_event_with_fields(events.pending, &[(field, name), ("reason", reason.as_str())]);
            ItemStatus::Pending
        }
        Routed::Unreachable(_) => ItemStatus::ConnectionFailed,
    }
}

fn with_detail(outcome: ShardingOutcome, routed: Routed) -> ShardingOutcome {
    match routed {
        Routed::Reply(reply) if !reply.is_ok() && !outcome.status.is_success() => {
            outcome.with_detail(reply.error_message())
        }
        Routed::Timeout(reason) | Routed::Unreachable(reason) => outcome.with_detail(reason),
        Routed::Reply(_) => outcome,
    }
}
