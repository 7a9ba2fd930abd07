//! CLI module for shardkeeper
//!
//! Provides command-line interface for:
//! - run: reconcile the cluster and print a run report
//! - plan: print the desired topology, offline
//! - inspect: print the live replica-set configuration

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{inspect, plan, provision, run, run_command};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
