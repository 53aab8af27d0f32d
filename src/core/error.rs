//! Error handling for compose-extends
//!
//! This module provides the error types and user-friendly error reporting used
//! by the inheritance resolver and the surrounding load pipeline. The error
//! system follows two principles:
//! 1. **Strongly-typed errors** so callers can match on the exact failure
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`ExtendsError`] - Enumerated error types for every failure in the resolution path
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! # Error Categories
//!
//! - **Shape**: [`ExtendsError::Shape`] - a value expected to be a mapping or string is not
//! - **Lookup**: [`ExtendsError::ServiceNotFound`] - an extends target is missing from its scope
//! - **Cycles**: [`ExtendsError::Cycle`] - a `(file, service)` pair was revisited
//! - **Loading**: [`ExtendsError::NoLoader`], [`ExtendsError::LoaderFailed`],
//!   [`ExtendsError::Read`], [`ExtendsError::Parse`]
//! - **Merging**: [`ExtendsError::Merge`] - propagated verbatim from the merge engine
//! - **Control**: [`ExtendsError::Cancelled`], [`ExtendsError::DeadlineExceeded`],
//!   [`ExtendsError::DepthExceeded`]
//!
//! Every error is fatal for the document being resolved: a partially merged
//! document is never returned.
//!
//! # Examples
//!
//! ```rust,no_run
//! use compose_extends::core::{ExtendsError, user_friendly_error};
//!
//! let error = ExtendsError::NoLoader {
//!     path: "https://example.com/base.yml".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // colored error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::extends::ChainEntry;
use crate::merge::MergeError;

/// The main error type for resolution and loading.
///
/// Each variant names the location, file or service involved so the message
/// can be shown to users without further context.
#[derive(Error, Debug)]
pub enum ExtendsError {
    /// A value was not of the expected kind.
    ///
    /// `location` is the dotted path of the offending value, e.g.
    /// `services.web` or `services.web.extends.file`.
    #[error("{location} must be a {expected}")]
    Shape {
        /// Dotted location of the offending value
        location: String,
        /// Expected kind ("mapping", "string", ...)
        expected: &'static str,
    },

    /// An extends target does not exist in the scope it should live in.
    #[error("cannot extend service \"{service}\" in {file}: service \"{target}\" not found")]
    ServiceNotFound {
        /// The extending service
        service: String,
        /// The missing base service
        target: String,
        /// File in which the target was looked up
        file: String,
        /// Closest existing service name, if any is similar enough
        suggestion: Option<String>,
    },

    /// A `(file, service)` pair was revisited within one resolution chain.
    #[error("circular reference: {}", format_chain(.chain))]
    Cycle {
        /// Ordered chain, ending with the revisited entry
        chain: Vec<ChainEntry>,
    },

    /// No configured resource loader accepts the reference.
    #[error("cannot read {path}")]
    NoLoader {
        /// The reference nobody accepted
        path: String,
    },

    /// A resource loader accepted the reference but failed to materialize it.
    #[error("failed to load {path}")]
    LoaderFailed {
        /// The reference being loaded
        path: String,
        /// Underlying loader failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The merge engine rejected a base/override pair.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The caller cancelled resolution.
    #[error("resolution cancelled")]
    Cancelled,

    /// The configured deadline passed before resolution completed.
    #[error("resolution deadline exceeded")]
    DeadlineExceeded,

    /// An extends chain is longer than the configured maximum.
    #[error("extends chain for service \"{service}\" exceeds maximum depth of {max_depth}")]
    DepthExceeded {
        /// Service whose chain was too deep
        service: String,
        /// Configured limit
        max_depth: usize,
    },

    /// A file could not be read.
    #[error("failed to read {}", .path.display())]
    Read {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A file is not valid YAML.
    #[error("failed to parse {file}")]
    Parse {
        /// File identity
        file: String,
        /// Underlying parser failure
        #[source]
        source: serde_yaml::Error,
    },

    /// Variable substitution failed.
    #[error("error while interpolating {path}: {reason}")]
    Interpolation {
        /// Dotted path of the value being interpolated
        path: String,
        /// Reason reported by the template engine
        reason: String,
    },

    /// The same service name is defined by an included file and its includer.
    #[error("service \"{service}\" from {file} conflicts with an existing service definition")]
    IncludeConflict {
        /// Conflicting service name
        service: String,
        /// Included file that defines it again
        file: String,
    },

    /// An included file includes itself, directly or transitively.
    #[error("include cycle detected: {}", .chain.join(" -> "))]
    IncludeCycle {
        /// Files on the include stack, ending with the repeated one
        chain: Vec<String>,
    },

    /// The resolved document is not usable.
    #[error("invalid document: {reason}")]
    Validation {
        /// Reason validation failed
        reason: String,
    },

    /// Configuration file problems.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },
}

impl ExtendsError {
    /// Shorthand for a [`ExtendsError::Shape`] expecting a mapping.
    pub fn not_a_mapping(location: impl Into<String>) -> Self {
        Self::Shape {
            location: location.into(),
            expected: "mapping",
        }
    }

    /// Shorthand for a [`ExtendsError::Shape`] expecting a string.
    pub fn not_a_string(location: impl Into<String>) -> Self {
        Self::Shape {
            location: location.into(),
            expected: "string",
        }
    }
}

fn format_chain(chain: &[ChainEntry]) -> String {
    chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show:
/// 1. **Error**: the main error message in red
/// 2. **Details**: additional context in yellow (optional)
/// 3. **Suggestion**: actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Creates a new error context with no suggestion or details.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Adds a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Adds additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Displays the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Converts any error into an [`ErrorContext`] with suggestions.
///
/// Known [`ExtendsError`] variants get tailored suggestions; everything else
/// is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(extends_error) = error.downcast_ref::<ExtendsError>() {
        return create_error_context(extends_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::NotFound {
            return ErrorContext::new(error_with_chain(&error))
                .with_suggestion("Check that the file exists and the path is correct");
        }
    }

    ErrorContext::new(error_with_chain(&error))
}

fn error_with_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

fn create_error_context(error: &ExtendsError) -> ErrorContext {
    let message = error.to_string();
    match error {
        ExtendsError::ServiceNotFound { target, suggestion, .. } => {
            let ctx = ErrorContext::new(message)
                .with_details("The base service of an extends directive must be defined in the referenced file");
            match suggestion {
                Some(candidate) => ctx.with_suggestion(format!(
                    "Did you mean \"{candidate}\" instead of \"{target}\"?"
                )),
                None => ctx.with_suggestion(format!(
                    "Define \"{target}\" or point extends.file at the file that defines it"
                )),
            }
        }
        ExtendsError::Cycle { .. } => ErrorContext::new(message)
            .with_details("Every service in the chain above extends the next one, and the last entry was already being resolved")
            .with_suggestion("Break the loop by removing one of the extends directives"),
        ExtendsError::NoLoader { .. } => ErrorContext::new(message)
            .with_suggestion("Check that the file exists relative to the extending file, or that remote loading is enabled for this reference"),
        ExtendsError::LoaderFailed { source, .. } => ErrorContext::new(message)
            .with_details(source.to_string())
            .with_suggestion("Check network access and credentials for remote references"),
        ExtendsError::DepthExceeded { .. } => ErrorContext::new(message)
            .with_suggestion("Shorten the inheritance chain or raise max_depth in the configuration"),
        ExtendsError::Parse { source, .. } => ErrorContext::new(message)
            .with_details(source.to_string())
            .with_suggestion("Check the YAML syntax: indentation, quotes and colons"),
        ExtendsError::Read { source, .. } => ErrorContext::new(message).with_details(source.to_string()),
        ExtendsError::Cancelled | ExtendsError::DeadlineExceeded => ErrorContext::new(message)
            .with_suggestion("Raise the timeout if slow remote references are expected"),
        _ => ErrorContext::new(message),
    }
}
