//! CLI module for homevault
//!
//! Provides command-line interface for:
//! - serve: Start the HTTP API
//! - check-config: Validate a configuration file
//! - schema-plan: Show migration statements between schema versions

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_state, check_config, run, run_command, schema_plan, serve};
pub use config::{Config, StorageSettings, TokenSettings};
pub use errors::{CliError, CliErrorCode, CliResult};
