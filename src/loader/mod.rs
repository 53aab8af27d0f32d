//! Loading configuration files into resolved documents.
//!
//! This module owns everything between a list of file names and a single,
//! inheritance-resolved document:
//!
//! - [`ResourceLoader`] - pluggable capability turning a reference (local
//!   path, git URL, ...) into a locally readable file
//! - [`LocalResourceLoader`] / [`GitResourceLoader`] - the two built-in loaders
//! - [`LoadOptions`] - which pipeline stages run, plus the loaders and merger
//! - [`load_document`] - the pipeline itself
//!
//! # Pipeline
//!
//! Each file is parsed, stripped of `!reset` values, interpolated, expanded
//! with its `include` entries and resolved for `extends`. The per-file
//! documents are then combined in order and the result is normalized,
//! completed with default values and validated. Every stage can be disabled
//! through [`LoadOptions`]; the cross-file base fetcher uses
//! [`LoadOptions::restricted`] to read a file without any of the stages that
//! must only run on the final merged document.

mod git;
mod include;
mod local;
mod normalize;
mod pipeline;
mod validate;

pub use git::{GitCommand, GitCommandOutput, GitReference, GitResourceLoader};
pub use local::LocalResourceLoader;
pub use normalize::{apply_defaults, normalize};
pub use pipeline::load_document;
pub use validate::validate;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{ExtendsError, ResolveContext};
use crate::interpolation;
use crate::merge::{Merger, OverrideMerger};

/// Default bound on the length of one extends chain.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Capability to materialize a file reference.
///
/// Loaders are tried in order; the first one whose [`accept`](Self::accept)
/// returns `true` handles the reference.
pub trait ResourceLoader: Send + Sync + fmt::Debug {
    /// Whether this loader can resolve `path`.
    fn accept(&self, path: &str) -> bool;

    /// Materialize `path` and return the local file to read.
    ///
    /// May block on I/O. Implementations should call
    /// [`ResolveContext::checkpoint`] before any long-running step.
    fn load(&self, ctx: &ResolveContext, path: &str) -> anyhow::Result<PathBuf>;

    /// Directory relative references inside `path` resolve against.
    fn dir(&self, path: &str) -> PathBuf;

    /// Whether this loader fetches from outside the local file system.
    fn is_remote(&self) -> bool {
        false
    }
}

/// Stages and collaborators of one load.
#[derive(Clone)]
pub struct LoadOptions {
    /// Skip `${VAR}` substitution
    pub skip_interpolation: bool,
    /// Skip validation of the final document
    pub skip_validation: bool,
    /// Skip normalization of the final document
    pub skip_normalization: bool,
    /// Skip default value injection
    pub skip_default_values: bool,
    /// Skip `include` expansion
    pub skip_include: bool,
    /// Skip `extends` resolution
    pub skip_extends: bool,
    /// Loaders tried in order for every file reference
    pub resource_loaders: Vec<Arc<dyn ResourceLoader>>,
    /// Merge engine used for `extends` and for combining files
    pub merger: Arc<dyn Merger>,
    /// Interpolation lookup and type casts
    pub interpolation: interpolation::Options,
    /// Maximum length of one extends chain
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_interpolation: false,
            skip_validation: false,
            skip_normalization: false,
            skip_default_values: false,
            skip_include: false,
            skip_extends: false,
            resource_loaders: Vec::new(),
            merger: Arc::new(OverrideMerger),
            interpolation: interpolation::Options::from_env().compose_defaults(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl LoadOptions {
    /// Default options with a local loader rooted at `working_dir`.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::default().with_loader(Arc::new(LocalResourceLoader::new(working_dir)))
    }

    /// Append a resource loader.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.resource_loaders.push(loader);
        self
    }

    /// The configured remote loaders, in order.
    pub fn remote_loaders(&self) -> Vec<Arc<dyn ResourceLoader>> {
        self.resource_loaders.iter().filter(|loader| loader.is_remote()).cloned().collect()
    }

    /// Same options with the local loader rooted at `dir`.
    ///
    /// Remote loaders are kept in order, followed by a fresh
    /// [`LocalResourceLoader`] for `dir`.
    #[must_use]
    pub fn rebased(&self, dir: &Path) -> Self {
        let mut options = self.clone();
        options.resource_loaders = self.remote_loaders();
        options.resource_loaders.push(Arc::new(LocalResourceLoader::new(dir)));
        options
    }

    /// Options for reading a file only to harvest its raw service map.
    ///
    /// Rebased onto `dir`, with nested extends, includes, normalization,
    /// default values and validation turned off: those run once on the
    /// merged result instead.
    #[must_use]
    pub fn restricted(&self, dir: &Path) -> Self {
        let mut options = self.rebased(dir);
        options.skip_extends = true;
        options.skip_include = true;
        options.skip_normalization = true;
        options.skip_default_values = true;
        options.skip_validation = true;
        options
    }

    fn has_local_loader(&self) -> bool {
        self.resource_loaders.iter().any(|loader| !loader.is_remote())
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("skip_interpolation", &self.skip_interpolation)
            .field("skip_validation", &self.skip_validation)
            .field("skip_normalization", &self.skip_normalization)
            .field("skip_default_values", &self.skip_default_values)
            .field("skip_include", &self.skip_include)
            .field("skip_extends", &self.skip_extends)
            .field("resource_loaders", &self.resource_loaders)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// The first loader accepting `path`.
pub(crate) fn select_loader<'o>(
    options: &'o LoadOptions,
    path: &str,
) -> Result<&'o Arc<dyn ResourceLoader>, ExtendsError> {
    options.resource_loaders.iter().find(|loader| loader.accept(path)).ok_or_else(|| ExtendsError::NoLoader {
        path: path.to_string(),
    })
}

/// Materialize `path` with `loader`, checking for cancellation first.
///
/// Loader failures are wrapped in [`ExtendsError::LoaderFailed`] except
/// cancellation and deadline errors raised from inside the loader, which
/// are passed through unchanged.
pub(crate) fn materialize(
    ctx: &ResolveContext,
    loader: &dyn ResourceLoader,
    path: &str,
) -> Result<PathBuf, ExtendsError> {
    ctx.checkpoint()?;
    tracing::debug!(target: "loader", "Loading {path} with {loader:?}");
    loader.load(ctx, path).map_err(|error| match error.downcast::<ExtendsError>() {
        Ok(interrupted @ (ExtendsError::Cancelled | ExtendsError::DeadlineExceeded)) => interrupted,
        Ok(other) => ExtendsError::LoaderFailed {
            path: path.to_string(),
            source: Box::new(other),
        },
        Err(error) => ExtendsError::LoaderFailed {
            path: path.to_string(),
            source: error.into(),
        },
    })
}

/// One file to load.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Name of the file, relative to the working directory or absolute
    pub filename: String,
    /// Content to use instead of reading `filename`
    pub content: Option<String>,
}

impl ConfigFile {
    /// A file read from disk.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: None,
        }
    }

    /// A file whose content is already in memory.
    pub fn with_content(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: Some(content.into()),
        }
    }
}

/// Input of [`load_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDetails {
    /// Directory relative file names resolve against
    pub working_dir: PathBuf,
    /// Files to load, later ones overriding earlier ones
    pub config_files: Vec<ConfigFile>,
}

impl ConfigDetails {
    /// Details for `files` under `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, config_files: Vec<ConfigFile>) -> Self {
        Self {
            working_dir: working_dir.into(),
            config_files,
        }
    }
}
