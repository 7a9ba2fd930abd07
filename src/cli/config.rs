//! Configuration file
//!
//! Loaded and validated once at the process boundary, then converted into
//! `RunSettings` and `ConnectorSettings`. Unknown keys are rejected.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::ConnectorSettings;
use crate::observability::Severity;
use crate::reconcile::{InstanceType, RunSettings};
use crate::topology::{ShardedCollectionSpec, DEFAULT_PORT, DEFAULT_SHARD_NAME};

use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name of this node (required)
    pub node_name: String,

    /// Cluster discovery is scoped to (optional)
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Deployment environment discovery is scoped to (optional)
    #[serde(default)]
    pub environment: String,

    /// "mongod", "shard", "configserver" or "mongos" (required)
    pub instance_type: String,

    /// Port of the local daemon (optional, default 27017)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether this node replicates (default: false)
    #[serde(default)]
    pub replicated: bool,

    /// Explicit replica-set name; ignored by shard instances
    #[serde(default)]
    pub replicaset_name: Option<String>,

    /// Shard name (optional, default "default")
    #[serde(default = "default_shard_name")]
    pub shard_name: String,

    /// Per-operation timeout in milliseconds (optional, default 5000)
    #[serde(default = "default_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Connect timeout in milliseconds (optional, default 5000)
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Treat an empty member list as fatal (default: false)
    #[serde(default)]
    pub solo: bool,

    /// Minimum log severity (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inventory file used for discovery (optional, default "./inventory.json")
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,

    /// `db.collection` → shard key (optional)
    #[serde(default)]
    pub sharded_collections: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_shard_name() -> String {
    DEFAULT_SHARD_NAME.to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_inventory_path() -> PathBuf {
    PathBuf::from("./inventory.json")
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration JSON
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.node_name.trim().is_empty() {
            return Err(CliError::config_error("node_name must not be empty"));
        }

        self.instance_type()?;

        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }

        if self.op_timeout_ms == 0 {
            return Err(CliError::config_error("op_timeout_ms must be > 0"));
        }

        if self.connect_timeout_ms == 0 {
            return Err(CliError::config_error("connect_timeout_ms must be > 0"));
        }

        self.log_level()?;

        if self.shard_name.trim().is_empty() {
            return Err(CliError::config_error("shard_name must not be empty"));
        }

        ShardedCollectionSpec::parse_all(&self.sharded_collections)
            .map_err(|e| CliError::config_error(e.to_string()))?;

        Ok(())
    }

    /// Parsed instance type
    pub fn instance_type(&self) -> CliResult<InstanceType> {
        self.instance_type
            .parse()
            .map_err(|e: crate::reconcile::ReconcileError| CliError::config_error(e.to_string()))
    }

    /// Parsed minimum log severity
    pub fn log_level(&self) -> CliResult<Severity> {
        self.log_level.parse().map_err(|e: String| {
            CliError::config_error(format!("Invalid log_level: {}", e))
        })
    }

    /// Replica-set name this node reconciles, if any.
    pub fn replica_set_name(&self) -> CliResult<Option<String>> {
        Ok(self.instance_type()?.resolve_replica_set_name(
            self.replicated,
            self.replicaset_name.as_deref(),
            &self.shard_name,
        ))
    }

    /// Convert to the settings of one provisioning run.
    pub fn to_run_settings(&self) -> CliResult<RunSettings> {
        let instance_type = self.instance_type()?;
        Ok(RunSettings {
            node_name: self.node_name.clone(),
            cluster_name: self.cluster_name.clone(),
            environment: self.environment.clone(),
            instance_type,
            port: self.port,
            replica_set_name: self.replica_set_name()?,
            shard_name: self.shard_name.clone(),
            solo: self.solo,
            sharded_collections: self.sharded_collections.clone(),
        })
    }

    /// Timeouts for the TCP connector.
    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
        }
    }
}
