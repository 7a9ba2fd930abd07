//! Database and collection sharding against a simulated routing layer

use std::collections::BTreeMap;

use shardkeeper::connector::{ConnectTarget, Fault, SimulatedCluster};
use shardkeeper::reconcile::{CollectionShardingPlanner, ItemStatus, ShardingTarget};

fn mapping() -> BTreeMap<String, String> {
    [("app.users", "user_id"), ("app.orders", "customer_id"), ("metrics.points", "ts")]
        .into_iter()
        .map(|(ns, key)| (ns.to_string(), key.to_string()))
        .collect()
}

fn planner(cluster: &SimulatedCluster) -> CollectionShardingPlanner<'_> {
    CollectionShardingPlanner::new(cluster, ConnectTarget::localhost(27017))
}

#[test]
fn test_second_call_reports_already_applied() {
    let cluster = SimulatedCluster::new();

    let first = planner(&cluster).plan_sharding(&mapping()).unwrap();
    assert!(first.iter().all(|o| o.status == ItemStatus::Applied));

    let second = planner(&cluster).plan_sharding(&mapping()).unwrap();
    assert_eq!(second.len(), first.len());
    assert!(second.iter().all(|o| o.status == ItemStatus::AlreadyApplied));
    assert!(second.iter().all(|o| o.detail.is_none()));

    assert_eq!(cluster.sharded_databases(), vec!["app", "metrics"]);
    assert_eq!(cluster.sharded_collections().len(), 3);
}

#[test]
fn test_each_database_enabled_once() {
    let cluster = SimulatedCluster::new();
    let outcomes = planner(&cluster).plan_sharding(&mapping()).unwrap();

    let databases: Vec<&ShardingTarget> = outcomes
        .iter()
        .map(|o| &o.target)
        .filter(|t| matches!(t, ShardingTarget::Database(_)))
        .collect();
    assert_eq!(
        databases,
        vec![
            &ShardingTarget::Database("app".to_string()),
            &ShardingTarget::Database("metrics".to_string()),
        ]
    );
    assert_eq!(cluster.count("enablesharding"), 2);
    assert_eq!(cluster.count("shardcollection"), 3);
}

#[test]
fn test_key_document_is_ascending() {
    let cluster = SimulatedCluster::new();
    planner(&cluster).plan_sharding(&mapping()).unwrap();

    let collections = cluster.sharded_collections();
    assert_eq!(collections["app.orders"].get("customer_id"), Some(&1));
    assert_eq!(collections["metrics.points"].len(), 1);
}

#[test]
fn test_unreachable_router_reports_every_item() {
    let cluster = SimulatedCluster::new();
    cluster.mark_unreachable("localhost:27017");

    let outcomes = planner(&cluster).plan_sharding(&mapping()).unwrap();

    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(|o| o.status == ItemStatus::ConnectionFailed));
    assert!(cluster.commands().is_empty());
}

#[test]
fn test_dropped_connection_mid_run() {
    let cluster = SimulatedCluster::new();
    cluster.inject("shardcollection", Fault::DropConnectionAfterApply);

    let outcomes = planner(&cluster).plan_sharding(&mapping()).unwrap();
    let statuses: Vec<ItemStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Applied,
            ItemStatus::Applied,
            ItemStatus::ConnectionFailed,
            ItemStatus::ConnectionFailed,
            ItemStatus::ConnectionFailed,
        ]
    );

    // next run picks up where this one stopped
    let rerun = planner(&cluster).plan_sharding(&mapping()).unwrap();
    assert!(rerun.iter().all(|o| o.status.is_success()));
    assert_eq!(cluster.sharded_collections().len(), 3);
}
