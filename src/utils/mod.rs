//! Shared helpers.
//!
//! - [`fs`] - file system operations with error context

pub mod fs;

pub use fs::{ensure_dir, read_text_file};
