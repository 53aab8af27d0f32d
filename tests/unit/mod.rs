//! Unit test suite for compose-extends
//!
//! Library-level tests that load real compose files from temporary
//! directories and check the resolved documents.
//!
//! ```bash
//! cargo test --test unit
//! ```
//!
//! # Test Organization
//!
//! - **extends_tests**: same-file inheritance, chains, cycles, lookups
//! - **cross_file_tests**: `extends.file` across local and remote files
//! - **pipeline_tests**: includes, resets, interpolation, combining files,
//!   normalization, validation, cancellation

mod cross_file_tests;
mod extends_tests;
mod pipeline_tests;
