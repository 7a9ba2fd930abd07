//! CLI argument definitions using clap
//!
//! Commands:
//! - shardkeeper run --config <path>
//! - shardkeeper plan --config <path>
//! - shardkeeper inspect --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// shardkeeper - converge a replicated, sharded deployment toward its desired topology
#[derive(Parser, Debug)]
#[command(name = "shardkeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile replica set, shards and collection sharding, then print a run report
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./shardkeeper.json")]
        config: PathBuf,
    },

    /// Print the desired topology without connecting to the cluster
    Plan {
        /// Path to configuration file
        #[arg(long, default_value = "./shardkeeper.json")]
        config: PathBuf,
    },

    /// Print the live replica-set configuration
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./shardkeeper.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
