//! `include` expansion.
//!
//! ```yaml
//! include:
//!   - common/db.yml
//!   - path: https://github.com/org/stack.git#main:monitoring.yml
//! ```
//!
//! Each entry is loaded through the resource loaders relative to the
//! including file and its services are added to the including document.
//! Defining a service both in the includer and an included file is an
//! error; other top-level sections are combined, the includer winning.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use super::pipeline::load_file;
use super::{ConfigFile, LoadOptions, materialize, select_loader};
use crate::core::{ExtendsError, ResolveContext};
use crate::document::{Document, SERVICES_KEY, key_segment, take_services};

/// Key listing the files to include.
pub const INCLUDE_KEY: &str = "include";

pub(super) fn apply_includes(
    ctx: &ResolveContext,
    document: &mut Document,
    identity: &str,
    dir: &Path,
    options: &LoadOptions,
    include_stack: &mut Vec<String>,
) -> Result<(), ExtendsError> {
    let entries = match document.shift_remove(INCLUDE_KEY) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Sequence(entries)) => entries,
        Some(_) => {
            return Err(ExtendsError::Shape {
                location: INCLUDE_KEY.to_string(),
                expected: "sequence",
            });
        }
    };

    let options = options.rebased(dir);
    include_stack.push(identity.to_string());

    for (index, entry) in entries.iter().enumerate() {
        let path = include_path(entry, index)?;
        let loader = select_loader(&options, path)?;
        let local = materialize(ctx, loader.as_ref(), path)?;
        let local_identity = local.display().to_string();

        if include_stack.contains(&local_identity) {
            let mut chain = include_stack.clone();
            chain.push(local_identity);
            return Err(ExtendsError::IncludeCycle {
                chain,
            });
        }

        tracing::debug!(target: "loader", "Including {local_identity} from {identity}");
        let included_dir = loader.dir(path);
        let included = load_file(
            ctx,
            &ConfigFile::new(local_identity.clone()),
            &included_dir,
            &options.rebased(&included_dir),
            include_stack,
        )?;
        add_included(document, included, &local_identity)?;
    }

    include_stack.pop();
    Ok(())
}

fn include_path(entry: &Value, index: usize) -> Result<&str, ExtendsError> {
    match entry {
        Value::String(path) => Ok(path.as_str()),
        Value::Mapping(entry) => entry
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtendsError::not_a_string(format!("{INCLUDE_KEY}[{index}].path"))),
        _ => Err(ExtendsError::Shape {
            location: format!("{INCLUDE_KEY}[{index}]"),
            expected: "string or mapping",
        }),
    }
}

fn add_included(document: &mut Document, mut included: Document, file: &str) -> Result<(), ExtendsError> {
    if let Some(included_services) = take_services(&mut included)? {
        let mut services = take_services(document)?.unwrap_or_default();
        for (key, service) in included_services {
            if services.contains_key(&key) {
                return Err(ExtendsError::IncludeConflict {
                    service: key_segment(&key),
                    file: file.to_string(),
                });
            }
            services.insert(key, service);
        }
        document.insert(SERVICES_KEY.into(), Value::Mapping(services));
    }

    for (key, value) in included {
        if key.as_str() == Some(SERVICES_KEY) {
            continue;
        }
        match document.get_mut(&key) {
            None => {
                document.insert(key, value);
            }
            Some(Value::Mapping(existing)) => {
                if let Value::Mapping(section) = value {
                    add_missing(existing, section);
                }
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn add_missing(existing: &mut Mapping, section: Mapping) {
    for (key, value) in section {
        if !existing.contains_key(&key) {
            existing.insert(key, value);
        }
    }
}
