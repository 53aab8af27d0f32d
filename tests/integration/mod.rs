//! Integration test suite for compose-extends
//!
//! End-to-end tests that run the `compose-extends` binary and load files
//! from real git repositories.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `resolve` command, output formats, errors and configuration
//! - **git_loader**: `extends.file` and `include` pointing at git repositories;
//!   skipped when `git` is not on `PATH`

mod cli;
