//! Variable interpolation over parsed documents.
//!
//! Walks every scalar string of a document, substitutes `${VAR}` references
//! (see [`template`]) and optionally casts the result to a typed scalar when
//! its [`Path`] matches a registered pattern, e.g. `services.*.deploy.replicas`
//! becomes an integer after substitution.

pub mod path;
pub mod template;

pub use path::{MATCH_ALL, MATCH_LIST, Path};
pub use template::{TemplateError, substitute};

use serde_yaml::{Mapping, Value};
use std::fmt;
use std::sync::Arc;

use crate::core::ExtendsError;
use crate::document::key_segment;

/// Maps a variable name to its value, `None` when unset.
pub type LookupValue = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Converts an interpolated string into a typed value.
pub type Cast = fn(&str) -> Result<Value, String>;

/// Options supported by [`interpolate`].
#[derive(Clone)]
pub struct Options {
    /// Variable lookup
    pub lookup: Arc<LookupValue>,
    /// Casts applied to strings whose path matches the pattern
    pub type_casts: Vec<(Path, Cast)>,
}

impl Options {
    /// Options with the given lookup and no type casts.
    pub fn new(lookup: Arc<LookupValue>) -> Self {
        Self {
            lookup,
            type_casts: Vec::new(),
        }
    }

    /// Options reading the process environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(|name: &str| std::env::var(name).ok()))
    }

    /// Register a cast for values at `pattern`.
    #[must_use]
    pub fn with_cast(mut self, pattern: impl Into<Path>, cast: Cast) -> Self {
        self.type_casts.push((pattern.into(), cast));
        self
    }

    /// Register casts for the numeric and boolean service fields commonly
    /// written with variables.
    #[must_use]
    pub fn compose_defaults(self) -> Self {
        self.with_cast("services.*.deploy.replicas", to_int)
            .with_cast("services.*.scale", to_int)
            .with_cast("services.*.healthcheck.retries", to_int)
            .with_cast("services.*.healthcheck.disable", to_bool)
            .with_cast("services.*.privileged", to_bool)
            .with_cast("services.*.read_only", to_bool)
            .with_cast("services.*.stdin_open", to_bool)
            .with_cast("services.*.tty", to_bool)
            .with_cast("services.*.init", to_bool)
            .with_cast("services.*.cpus", to_float)
    }

    fn cast_for(&self, path: &Path) -> Option<Cast> {
        self.type_casts
            .iter()
            .find(|(pattern, _)| path.matches(pattern))
            .map(|(_, cast)| *cast)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("type_casts", &self.type_casts.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Interpolate every string in `config` in place.
pub fn interpolate(config: &mut Mapping, options: &Options) -> Result<(), ExtendsError> {
    for (key, value) in config.iter_mut() {
        let path = Path::default().next(&key_segment(key));
        interpolate_value(value, &path, options)?;
    }
    Ok(())
}

fn interpolate_value(value: &mut Value, path: &Path, options: &Options) -> Result<(), ExtendsError> {
    match value {
        Value::String(s) => {
            let substituted =
                substitute(s, options.lookup.as_ref()).map_err(|err| ExtendsError::Interpolation {
                    path: path.to_string(),
                    reason: err.to_string(),
                })?;
            *value = match options.cast_for(path) {
                Some(cast) => cast(&substituted).map_err(|reason| ExtendsError::Interpolation {
                    path: path.to_string(),
                    reason,
                })?,
                None => Value::String(substituted),
            };
        }
        Value::Mapping(mapping) => {
            for (key, item) in mapping.iter_mut() {
                interpolate_value(item, &path.next(&key_segment(key)), options)?;
            }
        }
        Value::Sequence(items) => {
            let item_path = path.next(MATCH_LIST);
            for item in items.iter_mut() {
                interpolate_value(item, &item_path, options)?;
            }
        }
        Value::Tagged(tagged) => interpolate_value(&mut tagged.value, path, options)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Cast to an integer.
pub fn to_int(value: &str) -> Result<Value, String> {
    value
        .trim()
        .parse::<i64>()
        .map(|n| Value::Number(n.into()))
        .map_err(|_| format!("failed to cast to expected type: \"{value}\" is not an integer"))
}

/// Cast to a float.
pub fn to_float(value: &str) -> Result<Value, String> {
    value
        .trim()
        .parse::<f64>()
        .map(|n| Value::Number(n.into()))
        .map_err(|_| format!("failed to cast to expected type: \"{value}\" is not a number"))
}

/// Cast to a boolean, accepting the YAML 1.1 spellings.
pub fn to_bool(value: &str) -> Result<Value, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "on" => Ok(Value::Bool(true)),
        "n" | "no" | "false" | "off" => Ok(Value::Bool(false)),
        _ => Err(format!("failed to cast to expected type: \"{value}\" is not a boolean")),
    }
}
