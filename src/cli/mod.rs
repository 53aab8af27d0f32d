//! Command-line interface for compose-extends.
//!
//! The CLI is a thin layer over [`crate::loader::load_document`]: it reads the
//! resolver configuration, applies command-line overrides, runs the load on a
//! blocking worker and prints the resolved document.
//!
//! # Global Options
//!
//! - `-v, --verbose` - debug logging on stderr
//! - `-q, --quiet` - only errors on stderr
//! - `-c, --config <PATH>` - configuration file to use
//!
//! `RUST_LOG`, when set, takes precedence over `-v` and `-q`.
//!
//! # Example
//!
//! ```bash
//! compose-extends resolve -f compose.yml -f compose.override.yml
//! compose-extends -v resolve --service web --format json
//! ```

pub mod resolve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::ResolverConfig;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter directive, `None` to defer to `RUST_LOG`
    pub log_level: Option<String>,
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber writing to stderr.
    ///
    /// Does nothing if a subscriber is already installed.
    pub fn init_logging(&self) {
        let filter = match (&self.log_level, std::env::var("RUST_LOG")) {
            (_, Ok(_)) => EnvFilter::from_default_env(),
            (Some(level), Err(_)) => EnvFilter::new(level),
            (None, Err(_)) => EnvFilter::new("info"),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Resolve compose service inheritance across local and remote files.
#[derive(Parser, Debug)]
#[command(
    name = "compose-extends",
    about = "Resolve service inheritance (extends) across compose files",
    version,
    long_about = "compose-extends loads one or more compose files, resolves `extends` and `include` \
                  directives, including files fetched from git repositories, and prints the merged document."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load compose files and print the resolved document
    Resolve(resolve::ResolveCommand),
}

impl Cli {
    /// Run the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with an explicit [`CliConfig`].
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let resolver_config = ResolverConfig::load(config.config_path.as_deref())?;

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&resolver_config).await,
        }
    }
}
