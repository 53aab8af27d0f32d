//! compose-extends CLI entry point
//!
//! Parses the command line, runs the command and prints errors with their
//! context and suggestions.

use anyhow::Result;
use clap::Parser;
use compose_extends::cli;
use compose_extends::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
