//! Test utilities for compose-extends
//!
//! Helpers shared by unit and integration tests:
//!
//! - [`init_test_logging`] - install a test-friendly tracing subscriber once
//! - [`ComposeProject`] - a temporary project directory holding compose files
//! - [`MemoryLoader`] - a remote-like [`ResourceLoader`] serving in-memory files
//! - [`RecordingProcessor`] - a [`PostProcessor`] remembering every fragment
//!
//! # Example
//!
//! ```rust,no_run
//! use compose_extends::test_utils::ComposeProject;
//!
//! let project = ComposeProject::new().unwrap();
//! project.write("compose.yml", "services:\n  web: {image: nginx}\n").unwrap();
//! let document = project.load(&["compose.yml"]).unwrap();
//! assert_eq!(document["services"]["web"]["image"], "nginx");
//! ```

use anyhow::{Context, Result};
use serde_yaml::Mapping;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{ExtendsError, ResolveContext};
use crate::document::Document;
use crate::loader::{ConfigDetails, ConfigFile, LoadOptions, ResourceLoader, load_document};
use crate::postprocess::PostProcessor;
use crate::utils::ensure_dir;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither
/// is set. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=extends=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A temporary directory holding compose files.
///
/// The directory is removed when the project is dropped.
pub struct ComposeProject {
    dir: TempDir,
    root: PathBuf,
}

impl ComposeProject {
    /// Create an empty project.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let root = dir.path().canonicalize().context("Failed to resolve temp directory")?;
        Ok(Self { dir, root })
    }

    /// Canonical path of the project directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write `content` to `name`, creating parent directories.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Identity the resolver uses for `name`.
    pub fn identity(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }

    /// Load details for `files`, relative to the project directory.
    pub fn details(&self, files: &[&str]) -> ConfigDetails {
        ConfigDetails::new(&self.root, files.iter().copied().map(ConfigFile::new).collect())
    }

    /// Default options rooted at the project directory.
    pub fn options(&self) -> LoadOptions {
        LoadOptions::new(&self.root)
    }

    /// Load `files` with default options.
    pub fn load(&self, files: &[&str]) -> Result<Document, ExtendsError> {
        self.load_with(files, &self.options())
    }

    /// Load `files` with `options`.
    pub fn load_with(&self, files: &[&str], options: &LoadOptions) -> Result<Document, ExtendsError> {
        load_document(&ResolveContext::new(), &self.details(files), options)
    }

    /// The underlying temporary directory.
    pub fn temp_dir(&self) -> &TempDir {
        &self.dir
    }
}

/// Prefix of references served by [`MemoryLoader`].
pub const MEMORY_SCHEME: &str = "mem://";

/// Serves `mem://<name>` references from memory.
///
/// Files are written to a private temporary directory when loaded, so the
/// pipeline reads them like any other materialized file. Reports itself as
/// remote, which keeps it available inside restricted loads.
#[derive(Debug)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
    dir: TempDir,
    loads: AtomicUsize,
}

impl MemoryLoader {
    /// An empty loader.
    pub fn new() -> Result<Self> {
        Ok(Self {
            files: HashMap::new(),
            dir: TempDir::new().context("Failed to create temp directory")?,
            loads: AtomicUsize::new(0),
        })
    }

    /// Serve `content` as `mem://<name>`.
    #[must_use]
    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.files.insert(name.to_string(), content.to_string());
        self
    }

    /// How many times [`ResourceLoader::load`] succeeded.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn name<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(MEMORY_SCHEME).filter(|name| self.files.contains_key(*name))
    }
}

impl ResourceLoader for MemoryLoader {
    fn accept(&self, path: &str) -> bool {
        self.name(path).is_some()
    }

    fn load(&self, ctx: &ResolveContext, path: &str) -> Result<PathBuf> {
        ctx.checkpoint()?;
        let name = self.name(path).with_context(|| format!("No in-memory file for {path}"))?;
        let target = self.dir.path().join(name);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&target, &self.files[name]).with_context(|| format!("Failed to write {}", target.display()))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        target.canonicalize().with_context(|| format!("Failed to resolve {}", target.display()))
    }

    fn dir(&self, path: &str) -> PathBuf {
        let root = self.dir.path().to_path_buf();
        match path.strip_prefix(MEMORY_SCHEME).and_then(|name| Path::new(name).parent()) {
            Some(parent) => root.join(parent),
            None => root,
        }
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Remembers every fragment it is applied to.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    fragments: Mutex<Vec<Mapping>>,
}

impl RecordingProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments seen so far, in application order.
    pub fn fragments(&self) -> Vec<Mapping> {
        self.fragments.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PostProcessor for RecordingProcessor {
    fn apply(&self, fragment: &mut Mapping) {
        self.fragments.lock().unwrap_or_else(PoisonError::into_inner).push(fragment.clone());
    }
}

/// Options rooted at `project` with `loader` tried first.
pub fn options_with_memory(project: &ComposeProject, loader: Arc<MemoryLoader>) -> LoadOptions {
    LoadOptions::default().with_loader(loader).rebased(project.path())
}
