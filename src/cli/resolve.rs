//! The `resolve` command: load compose files and print the resolved document.

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::config::ResolverConfig;
use crate::core::ResolveContext;
use crate::document::{Document, SERVICES_KEY, services};
use crate::loader::{ConfigDetails, ConfigFile, load_document};

/// File names looked up in the project directory when no `-f` is given.
pub const DEFAULT_FILES: &[&str] = &["compose.yaml", "compose.yml", "docker-compose.yaml", "docker-compose.yml"];

/// Output format of the resolved document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// YAML, as written in compose files
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

/// Resolve `extends` and `include` across compose files.
#[derive(Args, Debug, Default)]
pub struct ResolveCommand {
    /// Compose file to load; repeat to layer files in order
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<String>,

    /// Directory relative paths resolve against (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub project_directory: Option<PathBuf>,

    /// Only print these services; repeatable
    #[arg(long = "service", value_name = "NAME")]
    pub services: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Do not substitute `${VAR}` references
    #[arg(long)]
    pub no_interpolate: bool,

    /// Do not normalize the resolved document
    #[arg(long)]
    pub no_normalize: bool,

    /// Do not validate the resolved document
    #[arg(long)]
    pub skip_validation: bool,

    /// Maximum length of one extends chain
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Abort resolution after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not load files from git repositories
    #[arg(long)]
    pub no_git: bool,
}

impl ResolveCommand {
    /// Run the command and print the document to stdout.
    pub async fn execute(self, config: &ResolverConfig) -> Result<()> {
        let output = self.run(config).await?;
        print!("{output}");
        Ok(())
    }

    /// Run the command and return the rendered document.
    pub async fn run(self, config: &ResolverConfig) -> Result<String> {
        let project_dir = match &self.project_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let files = if self.files.is_empty() { vec![discover(&project_dir)?] } else { self.files.clone() };

        let config = self.apply_overrides(config);
        config.validate()?;
        let mut options = config.load_options(&project_dir);
        options.skip_interpolation = self.no_interpolate;
        options.skip_normalization = self.no_normalize;
        options.skip_validation = self.skip_validation;

        let ctx = match config.timeout() {
            Some(timeout) => ResolveContext::new().with_timeout(timeout),
            None => ResolveContext::new(),
        };
        let details = ConfigDetails::new(project_dir, files.into_iter().map(ConfigFile::new).collect());
        tracing::debug!("Resolving {:?}", details.config_files);

        let worker_ctx = ctx.clone();
        let mut task = tokio::task::spawn_blocking(move || load_document(&worker_ctx, &details, &options));
        let finished = tokio::select! {
            joined = &mut task => Some(joined),
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    tracing::warn!("Interrupted, cancelling resolution");
                    ctx.cancel();
                }
                None
            }
        };
        let joined = match finished {
            Some(joined) => joined,
            None => task.await,
        };
        let document = joined.context("Resolution task failed")??;

        let document = select_services(document, &self.services)?;
        render(&document, self.format)
    }

    fn apply_overrides(&self, config: &ResolverConfig) -> ResolverConfig {
        let mut config = config.clone();
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if self.no_git {
            config.git.enabled = false;
        }
        config
    }
}

/// The first default compose file present in `dir`.
fn discover(dir: &Path) -> Result<String> {
    match DEFAULT_FILES.iter().find(|name| dir.join(name).is_file()) {
        Some(name) => Ok((*name).to_string()),
        None => bail!(
            "no configuration file provided: none of {} found in {}",
            DEFAULT_FILES.join(", "),
            dir.display()
        ),
    }
}

/// Keep only the requested services.
fn select_services(mut document: Document, names: &[String]) -> Result<Document> {
    if names.is_empty() {
        return Ok(document);
    }
    let available = services(&document)?.cloned().unwrap_or_default();

    let mut selected = Mapping::new();
    for name in names {
        match available.get(name.as_str()) {
            Some(service) => {
                selected.insert(Value::from(name.as_str()), service.clone());
            }
            None => bail!("no such service: {name}"),
        }
    }
    document.insert(SERVICES_KEY.into(), Value::Mapping(selected));
    Ok(document)
}

fn render(document: &Document, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(document).context("Failed to render YAML"),
        OutputFormat::Json => serde_json::to_string_pretty(document)
            .map(|json| json + "\n")
            .context("Failed to render JSON"),
    }
}
