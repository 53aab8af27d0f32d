//! compose-extends - service inheritance for compose files
//!
//! Resolves the `extends` directive of compose services, within one file or
//! across files reached through pluggable resource loaders (local disk and
//! git repositories), and produces a document where every service carries its
//! fully merged definition.
//!
//! # Architecture Overview
//!
//! Loading a set of compose files runs a pipeline per file:
//!
//! 1. read and parse the YAML
//! 2. record `!reset` tags ([`postprocess`])
//! 3. substitute `${VAR}` references ([`interpolation`])
//! 4. pull in `include` entries
//! 5. resolve `extends` ([`extends`])
//!
//! The per-file documents are then combined, normalized, given default values
//! and validated ([`loader`]).
//!
//! # Core Modules
//!
//! - [`core`] - error taxonomy, user-facing error reporting, cancellation
//! - [`document`] - accessors over the YAML document and structural cloning
//! - [`extends`] - inheritance resolver, chain tracker, cross-file fetching
//! - [`loader`] - resource loaders, load options and the load pipeline
//! - [`merge`] - the merge engine applied between a base and its child
//! - [`postprocess`] - post-processors run on relocated bases
//! - [`interpolation`] - path patterns and variable substitution
//! - [`config`] - resolver configuration file
//! - [`cli`] - command-line interface
//! - [`utils`] - file helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use compose_extends::core::ResolveContext;
//! use compose_extends::loader::{ConfigDetails, ConfigFile, LoadOptions, load_document};
//!
//! # fn main() -> anyhow::Result<()> {
//! let details = ConfigDetails::new("/srv/app", vec![ConfigFile::new("compose.yml")]);
//! let document = load_document(&ResolveContext::new(), &details, &LoadOptions::new("/srv/app"))?;
//! println!("{}", serde_yaml::to_string(&document)?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod document;
pub mod extends;
pub mod interpolation;
pub mod loader;
pub mod merge;
pub mod postprocess;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
