//! CLI command implementations
//!
//! Each command loads the configuration once, builds its collaborators
//! (TCP connector, inventory-backed discovery) and prints one JSON response.

use std::path::Path;

use serde_json::json;

use crate::connector::TcpConnector;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::reconcile::{ProvisioningRun, ReplicaSetReconciler, StaticInventory, TopologyPlan};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run { config } => provision(&config),
        Command::Plan { config } => plan(&config),
        Command::Inspect { config } => inspect(&config),
    }
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.log_level()?);

    let path = config_path.display().to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", path.as_str()), ("instance_type", config.instance_type.as_str())],
    );
    Ok(config)
}

/// Full provisioning pass.
///
/// Prints the run report; fails when the report carries Failed outcomes.
pub fn provision(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let inventory = StaticInventory::load(&config.inventory_path)?;
    let connector = TcpConnector::new(config.connector_settings());

    let report = ProvisioningRun::new(config.to_run_settings()?, &connector, &inventory).execute()?;
    write_response(serde_json::to_value(&report)?)?;

    if report.failed {
        return Err(CliError::run_failed(&report.run_id));
    }
    Ok(())
}

/// Print the desired topology without connecting.
pub fn plan(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let inventory = StaticInventory::load(&config.inventory_path)?;

    let plan = TopologyPlan::build(&config.to_run_settings()?, &inventory)?;
    write_response(serde_json::to_value(&plan)?)?;
    Ok(())
}

/// Print the live replica-set configuration of the local daemon.
pub fn inspect(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let name = config.replica_set_name()?.ok_or_else(|| {
        CliError::config_error(format!(
            "instance type '{}' does not reconcile a replica set",
            config.instance_type
        ))
    })?;

    let connector = TcpConnector::new(config.connector_settings());
    let live = ReplicaSetReconciler::new(&connector, config.port)
        .live_config(&name)
        .map_err(|e| CliError::connection_failed(e.message))?;

    write_response(json!({
        "replica_set": name,
        "initialized": live.is_some(),
        "config": live,
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, instance_type: &str, inventory: &str) -> std::path::PathBuf {
        let inventory_path = dir.path().join("inventory.json");
        fs::write(&inventory_path, inventory).unwrap();
        let config_path = dir.path().join("shardkeeper.json");
        let config = json!({
            "node_name": "router",
            "instance_type": instance_type,
            "inventory_path": inventory_path,
        });
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_dispatch_leaves_reporting_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.json");

        let err = run_command(Command::Plan { config }).unwrap_err();
        assert!(err.to_string().starts_with("SHARDKEEPER_CLI_CONFIG_ERROR: "));
    }

    #[test]
    fn test_plan_needs_no_connection() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = r#"{"nodes": [
            {"name": "cfg", "fqdn": "cfg.cluster", "ip_address": "10.0.1.1",
             "roles": ["configserver"]},
            {"name": "s1", "fqdn": "s1.cluster", "ip_address": "10.0.0.1", "roles": ["shard"]}
        ]}"#;
        let config_path = write_config(&dir, "mongos", inventory);
        assert!(plan(&config_path).is_ok());
    }

    #[test]
    fn test_wrong_config_server_count_aborts_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(&dir, "mongos", r#"{"nodes": []}"#);

        let err = provision(&config_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RunAborted);
        assert!(err.message().contains("SHARDKEEPER_WRONG_CONFIG_SERVER_COUNT"));
    }

    #[test]
    fn test_inspect_rejects_router() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(&dir, "mongos", r#"{"nodes": []}"#);

        let err = inspect(&config_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.message().contains("mongos"));
    }
}
