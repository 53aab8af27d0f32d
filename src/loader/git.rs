//! Loader for files inside git repositories.
//!
//! References take the form `<repository>#<ref>[:<path>]`, or a bare
//! repository URL ending in `.git`:
//!
//! ```text
//! https://github.com/org/stack.git#v1.2:compose/base.yaml
//! git@github.com:org/stack.git#main
//! file:///srv/repos/stack.git
//! ```
//!
//! The repository is shallow-cloned with the system `git` into a cache
//! directory keyed by a SHA-256 of repository and ref, and an existing
//! checkout is reused. Without a path the file `compose.yaml` at the
//! repository root is loaded.

use anyhow::{Context, Result, anyhow, bail};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::ResourceLoader;
use crate::core::ResolveContext;
use crate::utils::fs::ensure_dir;

/// File loaded when a reference names no path.
pub const DEFAULT_FILE: &str = "compose.yaml";

/// Default bound on a single git invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

const SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git@", "file://"];

/// A parsed git file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitReference {
    /// Repository URL
    pub repository: String,
    /// Branch or tag, `None` for the default branch
    pub reference: Option<String>,
    /// File inside the repository
    pub path: Option<String>,
}

impl GitReference {
    /// Parse `reference`, returning `None` when it is not a git reference.
    pub fn parse(reference: &str) -> Option<Self> {
        if !SCHEMES.iter().any(|scheme| reference.starts_with(scheme)) {
            return None;
        }

        match reference.split_once('#') {
            Some((repository, rest)) => {
                let (git_ref, path) = match rest.split_once(':') {
                    Some((git_ref, path)) => (git_ref, Some(path)),
                    None => (rest, None),
                };
                if repository.is_empty() {
                    return None;
                }
                Some(Self {
                    repository: repository.to_string(),
                    reference: Some(git_ref).filter(|r| !r.is_empty()).map(str::to_string),
                    path: path.filter(|p| !p.is_empty()).map(str::to_string),
                })
            }
            None if reference.ends_with(".git") => Some(Self {
                repository: reference.to_string(),
                reference: None,
                path: None,
            }),
            None => None,
        }
    }

    /// Cache key for the checkout of this repository and ref.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.repository.as_bytes());
        hasher.update(b"#");
        hasher.update(self.reference.as_deref().unwrap_or_default().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The file to load inside the checkout.
    pub fn file(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_FILE)
    }
}

/// Loads files from git repositories through a checkout cache.
#[derive(Debug, Clone)]
pub struct GitResourceLoader {
    cache_dir: PathBuf,
    timeout: Duration,
}

impl GitResourceLoader {
    /// Loader caching checkouts under `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every git invocation by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory holding the checkout of `reference`.
    pub fn checkout_dir(&self, reference: &GitReference) -> PathBuf {
        self.cache_dir.join(reference.cache_key())
    }

    fn checkout(&self, ctx: &ResolveContext, reference: &GitReference) -> Result<PathBuf> {
        let target = self.checkout_dir(reference);
        if target.join(".git").exists() {
            tracing::debug!(target: "git", "Reusing checkout of {} at {}", reference.repository, target.display());
            return Ok(target);
        }

        ensure_dir(&self.cache_dir)?;
        let staging = self.cache_dir.join(format!("{}.tmp-{}", reference.cache_key(), std::process::id()));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .with_context(|| format!("Failed to remove stale checkout: {}", staging.display()))?;
        }

        let cloned = GitCommand::clone_shallow(&reference.repository, reference.reference.as_deref(), &staging)
            .timeout(self.timeout)
            .with_context(format!("fetching {}", reference.repository))
            .execute(ctx);
        if let Err(error) = cloned {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(error);
        }

        if let Err(error) = std::fs::rename(&staging, &target) {
            // Another process finished the same checkout first.
            let _ = std::fs::remove_dir_all(&staging);
            if !target.join(".git").exists() {
                return Err(error).with_context(|| format!("Failed to move checkout to {}", target.display()));
            }
        }
        Ok(target)
    }
}

impl ResourceLoader for GitResourceLoader {
    fn accept(&self, path: &str) -> bool {
        GitReference::parse(path).is_some()
    }

    fn load(&self, ctx: &ResolveContext, path: &str) -> Result<PathBuf> {
        let reference = GitReference::parse(path).ok_or_else(|| anyhow!("not a git reference: {path}"))?;
        let file = Path::new(reference.file());
        if file.is_absolute() || file.components().any(|c| matches!(c, Component::ParentDir)) {
            bail!("path {} escapes repository {}", file.display(), reference.repository);
        }

        ctx.checkpoint()?;
        let checkout = self.checkout(ctx, &reference)?;
        let local = checkout.join(file);
        if !local.is_file() {
            bail!("{} not found in {}", file.display(), reference.repository);
        }
        Ok(local)
    }

    fn dir(&self, path: &str) -> PathBuf {
        match GitReference::parse(path) {
            Some(reference) => {
                let local = self.checkout_dir(&reference).join(reference.file());
                local.parent().map_or_else(|| self.cache_dir.clone(), Path::to_path_buf)
            }
            None => self.cache_dir.clone(),
        }
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Captured output of a successful git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Builder for a blocking git invocation.
///
/// The process is polled so that cancellation of the [`ResolveContext`]
/// and the command timeout both kill it promptly.
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Some(DEFAULT_TIMEOUT),
            context: None,
        }
    }
}

impl GitCommand {
    /// An empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// `git clone --depth 1 [--branch <ref>] <url> <target>`.
    pub fn clone_shallow(url: &str, reference: Option<&str>, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--quiet", "--depth", "1"]);
        if let Some(reference) = reference {
            cmd = cmd.args(["--branch", reference]);
        }
        cmd.arg(url).arg(target.as_ref().display().to_string())
    }

    /// Add one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir` (passed to git as `-C`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the process after `duration`.
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = Some(duration);
        self
    }

    /// Label used in log lines and errors.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Run the command, failing on a non-zero exit status.
    pub fn execute(self, ctx: &ResolveContext) -> Result<GitCommandOutput> {
        let git = which::which("git").context("git is not installed or not on PATH")?;

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        let rendered = full_args.join(" ");

        match &self.context {
            Some(label) => tracing::debug!(target: "git", "({label}) Executing command: git {rendered}"),
            None => tracing::debug!(target: "git", "Executing command: git {rendered}"),
        }

        let start = Instant::now();
        let mut child = Command::new(git)
            .args(&full_args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute git {rendered}"))?;
        // git blocks once a pipe buffer is full, so both pipes are drained while polling.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait().with_context(|| format!("Failed to wait for git {rendered}"))? {
                break status;
            }
            if let Err(interrupted) = ctx.checkpoint() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(interrupted.into());
            }
            if let Some(limit) = self.timeout_duration {
                if start.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(target: "git", "Command timed out after {} seconds: git {rendered}", limit.as_secs());
                    bail!(
                        "git command timed out after {} seconds: git {rendered}\n\
                         This may indicate network problems or an authentication prompt",
                        limit.as_secs()
                    );
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = String::from_utf8_lossy(&stdout_reader.join().unwrap_or_default()).to_string();
        let stderr = String::from_utf8_lossy(&stderr_reader.join().unwrap_or_default()).to_string();

        if !status.success() {
            tracing::debug!(target: "git", "Command failed with exit code: {:?}", status.code());
            let operation = self.args.first().cloned().unwrap_or_else(|| "command".to_string());
            let message = format!("git {operation} failed: {}", stderr.trim());
            return Err(match self.context {
                Some(label) => anyhow!(message).context(format!("Failed while {label}")),
                None => anyhow!(message),
            });
        }

        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "git {rendered} took {}ms", elapsed.as_millis());
        }
        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }
}

/// Read `pipe` to the end on a separate thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buffer) {
                tracing::debug!(target: "git", "Failed to read command output: {e}");
            }
        }
        buffer
    })
}
