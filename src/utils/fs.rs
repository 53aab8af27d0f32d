//! File system helpers.
//!
//! Thin wrappers over [`std::fs`] that attach the path involved to every
//! error, so failures read well when surfaced through `anyhow`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use compose_extends::utils::fs::{ensure_dir, read_text_file};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("cache/git"))?;
//! let content = read_text_file(Path::new("compose.yaml"))?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create `path` and its parents if needed.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or if it
/// cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!("Failed to create directory: {}\n\nCheck directory permissions and path validity", path.display())
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Read a UTF-8 text file.
pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
