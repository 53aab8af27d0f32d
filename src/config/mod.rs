//! Resolver configuration.
//!
//! Settings are read from a TOML file, located in this order:
//!
//! 1. the path given with `--config`
//! 2. the path in the `COMPOSE_EXTENDS_CONFIG` environment variable
//! 3. `compose-extends/config.toml` under the platform configuration
//!    directory (`~/.config` on Linux)
//!
//! A missing file at the default location yields the defaults; a missing
//! file that was named explicitly is an error.
//!
//! ```toml
//! max_depth = 64
//! timeout_secs = 120
//!
//! [git]
//! enabled = true
//! cache_dir = "/var/cache/compose-extends/git"
//! timeout_secs = 300
//! ```
//!
//! Command-line flags override the values read here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::ExtendsError;
use crate::loader::{DEFAULT_MAX_DEPTH, GitResourceLoader, LoadOptions};
use crate::utils::fs::read_text_file;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "COMPOSE_EXTENDS_CONFIG";

/// Settings for a resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum length of one extends chain
    pub max_depth: usize,
    /// Overall deadline in seconds, unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Git loader settings
    pub git: GitConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout_secs: None,
            git: GitConfig::default(),
        }
    }
}

/// Settings of the git resource loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Whether git references are loaded at all
    pub enabled: bool,
    /// Where checkouts are cached, platform cache directory when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Bound on a single git invocation
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
            timeout_secs: 300,
        }
    }
}

impl GitConfig {
    /// The checkout cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("compose-extends")
                .join("git")
        })
    }
}

impl ResolverConfig {
    /// Load the configuration following the lookup order.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file does not exist, or if the
    /// file found cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = read_text_file(path)?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration from {}", path.display()))?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("compose-extends").join("config.toml"))
    }

    /// Reject values the resolver cannot work with.
    pub fn validate(&self) -> Result<(), ExtendsError> {
        if self.max_depth == 0 {
            return Err(ExtendsError::Config {
                message: "max_depth must be at least 1".to_string(),
            });
        }
        if self.git.timeout_secs == 0 {
            return Err(ExtendsError::Config {
                message: "git.timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The overall deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Load options for a project rooted at `working_dir`.
    ///
    /// The git loader, when enabled, is tried before the local loader.
    pub fn load_options(&self, working_dir: &Path) -> LoadOptions {
        let mut options = LoadOptions::default();
        options.max_depth = self.max_depth;
        if self.git.enabled {
            let git = GitResourceLoader::new(self.git.cache_dir())
                .with_timeout(Duration::from_secs(self.git.timeout_secs));
            options = options.with_loader(Arc::new(git));
        }
        options.rebased(working_dir)
    }
}
