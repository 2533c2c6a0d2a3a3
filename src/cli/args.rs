//! CLI argument definitions using clap
//!
//! Commands:
//! - homevault serve --config <path>
//! - homevault check-config --config <path>
//! - homevault schema-plan --from <version> [--to <version>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// homevault - self-hosted per-user file storage on an S3-compatible backend
#[derive(Parser, Debug)]
#[command(name = "homevault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./homevault.json")]
        config: PathBuf,
    },

    /// Load and validate a configuration file, then print its effective values
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./homevault.json")]
        config: PathBuf,
    },

    /// Print the migration statements that move the schema between versions
    SchemaPlan {
        /// Current schema version
        #[arg(long, default_value_t = 0)]
        from: u32,

        /// Target schema version (default: latest)
        #[arg(long)]
        to: Option<u32>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
