//! Merging a service definition over the one it extends.
//!
//! The resolver treats merging as an opaque operation behind the [`Merger`]
//! trait. [`OverrideMerger`] is the default implementation, following the
//! usual Compose override rules:
//!
//! | Field | Rule |
//! |---|---|
//! | any value tagged `!override` | replaces the base value |
//! | `command`, `entrypoint`, `healthcheck.test` | replaced |
//! | `environment`, `labels`, `build.args`, `extra_hosts` | merged by key, lists of `KEY=VALUE` accepted |
//! | other mappings | merged recursively |
//! | other sequences | base items followed by new override items |
//! | scalars | override wins |
//!
//! A mapping paired with a scalar or sequence is rejected with a
//! [`MergeError`].

use serde_yaml::{Mapping, Sequence, Value};
use thiserror::Error;

use crate::document::{SERVICES_KEY, key_segment, untag};
use crate::interpolation::Path;

/// Tag forcing an override value to replace the base value.
pub const OVERRIDE_TAG: &str = "override";

/// Fields whose override value always replaces the base value.
const REPLACED: &[&str] = &[
    "services.*.command",
    "services.*.entrypoint",
    "services.*.healthcheck.test",
];

/// Fields merged key by key, with the separators accepted in list form.
const KEY_VALUE: &[(&str, &[char])] = &[
    ("services.*.environment", &['=']),
    ("services.*.labels", &['=']),
    ("services.*.build.args", &['=']),
    ("services.*.extra_hosts", &['=', ':']),
];

/// Error raised when two service definitions cannot be combined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot merge {path}: {reason}")]
pub struct MergeError {
    /// Dotted path of the conflicting value
    pub path: String,
    /// Why the values could not be merged
    pub reason: String,
}

impl MergeError {
    fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Combines a base service definition with the definition extending it.
pub trait Merger: Send + Sync {
    /// Merge `child` over `base` for the service called `service`.
    fn merge(&self, service: &str, base: Mapping, child: Mapping) -> Result<Mapping, MergeError>;
}

/// Compose-style merge rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideMerger;

impl Merger for OverrideMerger {
    fn merge(&self, service: &str, base: Mapping, child: Mapping) -> Result<Mapping, MergeError> {
        merge_mappings(base, child, &Path::new([SERVICES_KEY, service]))
    }
}

fn merge_mappings(mut base: Mapping, child: Mapping, path: &Path) -> Result<Mapping, MergeError> {
    for (key, value) in child {
        let key_path = path.next(&key_segment(&key));
        match base.get_mut(&key) {
            Some(slot) => {
                let current = std::mem::replace(slot, Value::Null);
                *slot = merge_values(current, value, &key_path)?;
            }
            None => {
                base.insert(key, untagged(value));
            }
        }
    }
    Ok(base)
}

fn merge_values(base: Value, child: Value, path: &Path) -> Result<Value, MergeError> {
    let child = match child {
        Value::Tagged(tagged) if tagged.tag == OVERRIDE_TAG => return Ok(untagged(tagged.value)),
        Value::Tagged(tagged) => tagged.value,
        other => other,
    };
    let base = match base {
        Value::Tagged(tagged) => tagged.value,
        other => other,
    };

    if REPLACED.iter().any(|pattern| path.matches(&Path::from(*pattern))) {
        return Ok(untagged(child));
    }
    if let Some((_, separators)) = KEY_VALUE.iter().find(|(pattern, _)| path.matches(&Path::from(*pattern))) {
        let mut merged = to_key_value(base, separators, path)?;
        merged.extend(to_key_value(untagged(child), separators, path)?);
        return Ok(Value::Mapping(merged));
    }
    if path.matches(&Path::from("services.*.build")) {
        return Ok(Value::Mapping(merge_mappings(
            build_mapping(base, path)?,
            build_mapping(child, path)?,
            path,
        )?));
    }

    match (base, child) {
        (Value::Mapping(base), Value::Mapping(child)) => Ok(Value::Mapping(merge_mappings(base, child, path)?)),
        (Value::Sequence(base), Value::Sequence(child)) => {
            Ok(Value::Sequence(append_unique(base, child.into_iter().map(untagged).collect())))
        }
        (Value::Null, child) => Ok(untagged(child)),
        (Value::Mapping(_), Value::Null) => Ok(Value::Null),
        (Value::Mapping(_), other) => Err(MergeError::new(
            path,
            format!("cannot override a mapping with {}", kind(&other)),
        )),
        (other, Value::Mapping(_)) => Err(MergeError::new(
            path,
            format!("cannot override {} with a mapping", kind(&other)),
        )),
        (_, child) => Ok(untagged(child)),
    }
}

/// A child value placed as is, without merging: none of its tags apply.
fn untagged(mut value: Value) -> Value {
    untag(&mut value);
    value
}

fn append_unique(mut base: Sequence, child: Sequence) -> Sequence {
    for item in child {
        if !base.contains(&item) {
            base.push(item);
        }
    }
    base
}

/// Convert a mapping or a `KEY=VALUE` list to a mapping.
fn to_key_value(value: Value, separators: &[char], path: &Path) -> Result<Mapping, MergeError> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(entry) => Ok(match entry.split_once(separators) {
                    Some((key, value)) => (Value::from(key), Value::from(value)),
                    None => (Value::from(entry), Value::Null),
                }),
                other => Err(MergeError::new(
                    path,
                    format!("list entries must be strings, found {}", kind(&other)),
                )),
            })
            .collect(),
        other => Err(MergeError::new(
            path,
            format!("expected a mapping or a list, found {}", kind(&other)),
        )),
    }
}

/// `build: <context>` is shorthand for `build: {context: <context>}`.
fn build_mapping(value: Value, path: &Path) -> Result<Mapping, MergeError> {
    match value {
        Value::String(context) => {
            let mut build = Mapping::new();
            build.insert("context".into(), Value::String(context));
            Ok(build)
        }
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(build) => Ok(build),
        other => Err(MergeError::new(
            path,
            format!("expected a string or a mapping, found {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
