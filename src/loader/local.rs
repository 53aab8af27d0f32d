//! Loader for files on the local file system.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::ResourceLoader;
use crate::core::ResolveContext;

/// Resolves references relative to a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResourceLoader {
    working_dir: PathBuf,
}

impl LocalResourceLoader {
    /// Loader resolving against `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// The directory references resolve against.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn abs(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() { path.to_path_buf() } else { self.working_dir.join(path) }
    }
}

impl ResourceLoader for LocalResourceLoader {
    fn accept(&self, path: &str) -> bool {
        self.abs(path).is_file()
    }

    fn load(&self, ctx: &ResolveContext, path: &str) -> Result<PathBuf> {
        ctx.checkpoint()?;
        let abs = self.abs(path);
        abs.canonicalize().with_context(|| format!("Failed to resolve path: {}", abs.display()))
    }

    fn dir(&self, path: &str) -> PathBuf {
        let abs = self.abs(path);
        let abs = abs.canonicalize().unwrap_or(abs);
        abs.parent().map_or_else(|| self.working_dir.clone(), Path::to_path_buf)
    }
}
