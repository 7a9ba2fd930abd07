//! End-to-end provisioning runs: config file and inventory on disk, a
//! simulated cluster on the wire.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use shardkeeper::cli::Config;
use shardkeeper::connector::{CommandReply, Fault, SimulatedCluster};
use shardkeeper::reconcile::{
    InstanceType, ItemStatus, ProvisioningRun, ReconcileError, ReplicaSetAction, ReplicaSetOutcome,
    RunReport, StaticInventory, TopologyPlan,
};

const INVENTORY: &str = r#"{
    "nodes": [
        {"name": "s1a", "fqdn": "s1a.cluster", "ip_address": "10.0.0.1", "cluster_name": "main",
         "environment": "prod", "shard_name": "shard1", "roles": ["shard", "replicaset"]},
        {"name": "s1b", "fqdn": "s1b.cluster", "ip_address": "10.0.0.2", "cluster_name": "main",
         "environment": "prod", "shard_name": "shard1", "roles": ["shard", "replicaset"]},
        {"name": "s2a", "fqdn": "s2a.cluster", "ip_address": "10.0.0.3", "cluster_name": "main",
         "environment": "prod", "shard_name": "shard2", "roles": ["shard"]},
        {"name": "cfg", "fqdn": "cfg.cluster", "ip_address": "10.0.1.1", "port": 27019,
         "cluster_name": "main", "environment": "prod", "roles": ["configserver"]},
        {"name": "far", "fqdn": "far.cluster", "ip_address": "10.9.0.1", "cluster_name": "other",
         "environment": "prod", "shard_name": "shard1", "roles": ["shard", "replicaset"]}
    ]
}"#;

struct Fixture {
    _dir: TempDir,
    config: Config,
    inventory: StaticInventory,
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn fixture(config_body: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let inventory_path = write(dir.path(), "inventory.json", INVENTORY);
    let config_json = format!(
        r#"{{ {}, "cluster_name": "main", "environment": "prod", "inventory_path": {:?} }}"#,
        config_body,
        inventory_path.display().to_string()
    );
    let config_path = write(dir.path(), "shardkeeper.json", &config_json);

    let config = Config::load(&config_path).unwrap();
    let inventory = StaticInventory::load(&config.inventory_path).unwrap();
    Fixture {
        _dir: dir,
        config,
        inventory,
    }
}

fn shard_node() -> Fixture {
    fixture(
        r#""node_name": "s1a", "instance_type": "shard", "replicated": true,
           "shard_name": "shard1""#,
    )
}

fn router() -> Fixture {
    fixture(
        r#""node_name": "router", "instance_type": "mongos",
           "sharded_collections": {"app.users": "user_id", "app.events": "ts"}"#,
    )
}

fn execute(fixture: &Fixture, cluster: &SimulatedCluster) -> Result<RunReport, ReconcileError> {
    let settings = fixture.config.to_run_settings().unwrap();
    ProvisioningRun::new(settings, cluster, &fixture.inventory).execute()
}

#[test]
fn test_replicated_shard_initiates_its_own_replica_set() {
    let fixture = shard_node();
    let cluster = SimulatedCluster::new();

    let report = execute(&fixture, &cluster).unwrap();

    let replica_set = report.replica_set.as_ref().unwrap();
    assert_eq!(replica_set.name, "rs_shard1");
    assert_eq!(
        replica_set.outcome,
        ReplicaSetOutcome::ConfigCurrent {
            version: Some(1),
            action: ReplicaSetAction::Initiated,
        }
    );
    // Only siblings of the same shard and cluster
    assert_eq!(
        cluster.replica_set().unwrap().member_hosts(),
        vec!["s1a.cluster:27017", "s1b.cluster:27017"]
    );
    assert!(report.shards.is_empty());
    assert!(!report.failed);
    assert_eq!(report.instance_type, InstanceType::Shard);
}

#[test]
fn test_replicated_mongod_ignores_other_shards_members() {
    let inventory = StaticInventory::parse(
        r#"{"nodes": [
            {"name": "db1", "fqdn": "db1.cluster", "ip_address": "10.0.2.1", "cluster_name": "main",
             "roles": ["replicaset"]},
            {"name": "s1a", "fqdn": "s1a.cluster", "ip_address": "10.0.0.1", "cluster_name": "main",
             "shard_name": "shard1", "roles": ["shard", "replicaset"]}
        ]}"#,
    )
    .unwrap();
    let config = Config::parse(
        r#"{"node_name": "db1", "instance_type": "mongod", "replicated": true,
            "cluster_name": "main"}"#,
    )
    .unwrap();
    let cluster = SimulatedCluster::new();

    let report = ProvisioningRun::new(config.to_run_settings().unwrap(), &cluster, &inventory)
        .execute()
        .unwrap();

    assert_eq!(report.replica_set.unwrap().name, "rs_default");
    assert_eq!(cluster.replica_set().unwrap().member_hosts(), vec!["db1.cluster:27017"]);
}

#[test]
fn test_router_registers_shards_and_collections() {
    let fixture = router();
    let cluster = SimulatedCluster::new();

    let report = execute(&fixture, &cluster).unwrap();

    assert!(report.replica_set.is_none());
    let specs: Vec<&str> = report.shards.iter().map(|s| s.spec.as_str()).collect();
    assert_eq!(specs, vec!["rs_shard1/s1a.cluster:27017,s1b.cluster:27017", "s2a.cluster:27017"]);
    assert_eq!(report.sharding.len(), 3);
    assert!(report.sharding.iter().all(|s| s.status == ItemStatus::Applied));

    let order: Vec<&str> = cluster.commands().iter().map(|c| c.name()).collect();
    let last_add = order.iter().rposition(|n| *n == "addShard").unwrap();
    let first_enable = order.iter().position(|n| *n == "enablesharding").unwrap();
    assert!(last_add < first_enable);
}

#[test]
fn test_router_rerun_is_all_already_applied() {
    let fixture = router();
    let cluster = SimulatedCluster::new();

    execute(&fixture, &cluster).unwrap();
    let second = execute(&fixture, &cluster).unwrap();

    assert!(second.shards.iter().all(|s| s.status == ItemStatus::AlreadyApplied));
    assert!(second.sharding.iter().all(|s| s.status == ItemStatus::AlreadyApplied));
    assert!(!second.failed);
    assert_eq!(cluster.shards().len(), 2);
}

#[test]
fn test_failed_shard_fails_the_run_but_later_phases_still_run() {
    let fixture = router();
    let cluster = SimulatedCluster::new();
    let rejected = CommandReply::failure("host does not belong to replica set");
    cluster.inject("addShard", Fault::Reply(rejected));

    let report = execute(&fixture, &cluster).unwrap();

    assert!(report.failed);
    assert_eq!(report.shards[0].status, ItemStatus::Failed);
    assert_eq!(report.shards[1].status, ItemStatus::Applied);
    assert!(report.sharding.iter().all(|s| s.status == ItemStatus::Applied));
}

#[test]
fn test_pending_outcomes_do_not_fail_the_run() {
    let fixture = shard_node();
    let cluster = SimulatedCluster::new();
    cluster.inject("replSetInitiate", Fault::Timeout);

    let report = execute(&fixture, &cluster).unwrap();

    assert!(matches!(
        report.replica_set.unwrap().outcome,
        ReplicaSetOutcome::PendingConvergence { .. }
    ));
    assert!(!report.failed);
}

#[test]
fn test_unreachable_cluster_does_not_fail_the_run() {
    let fixture = shard_node();
    let cluster = SimulatedCluster::new();
    cluster.mark_unreachable("localhost:27017");

    let report = execute(&fixture, &cluster).unwrap();
    assert!(matches!(
        report.replica_set.unwrap().outcome,
        ReplicaSetOutcome::ConnectionFailed { .. }
    ));
    assert!(!report.failed);
}

#[test]
fn test_solo_node_without_members_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let inventory_path = write(dir.path(), "inventory.json", r#"{"nodes": []}"#);
    let config_path = write(
        dir.path(),
        "shardkeeper.json",
        &format!(
            r#"{{"node_name": "db1", "instance_type": "mongod", "replicaset_name": "rs0",
                "solo": true, "inventory_path": {:?}}}"#,
            inventory_path.display().to_string()
        ),
    );
    let config = Config::load(&config_path).unwrap();
    let inventory = StaticInventory::load(&config.inventory_path).unwrap();
    let cluster = SimulatedCluster::new();

    let err = ProvisioningRun::new(config.to_run_settings().unwrap(), &cluster, &inventory)
        .execute()
        .unwrap_err();
    assert_eq!(
        err,
        ReconcileError::NoMembersFound {
            replica_set: "rs0".to_string()
        }
    );
    assert!(cluster.commands().is_empty());
}

#[test]
fn test_report_serializes_with_failed_flag() {
    let fixture = router();
    let cluster = SimulatedCluster::new();

    let report = execute(&fixture, &cluster).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["failed"], false);
    assert_eq!(json["instance_type"], "mongos");
    assert_eq!(json["shards"][0]["status"], "applied");
    assert_eq!(json["sharding"][0]["target"]["kind"], "database");
    assert!(json.get("replica_set").is_none());
    assert_eq!(json["run_id"].as_str().unwrap().len(), 36);
}

#[test]
fn test_plan_matches_what_a_run_submits() {
    let fixture = router();
    let settings = fixture.config.to_run_settings().unwrap();
    let plan = TopologyPlan::build(&settings, &fixture.inventory).unwrap();

    let cluster = SimulatedCluster::new();
    let report = execute(&fixture, &cluster).unwrap();

    let run_specs: Vec<String> = report.shards.iter().map(|s| s.spec.clone()).collect();
    assert_eq!(plan.shards, run_specs);
    assert_eq!(plan.databases, vec!["app"]);
    assert_eq!(plan.config_servers, Some(1));
}
