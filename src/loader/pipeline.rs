//! The load pipeline.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    ConfigDetails, ConfigFile, LoadOptions, LocalResourceLoader, apply_defaults, include, normalize, validate,
};
use crate::core::{ExtendsError, ResolveContext};
use crate::document::{Document, SERVICES_KEY, key_segment, take_services};
use crate::extends::ExtendsResolver;
use crate::interpolation::interpolate;
use crate::merge::Merger;
use crate::postprocess::ResetProcessor;

/// Load, combine and resolve the files in `details`.
///
/// When `options` has no local loader, one rooted at
/// `details.working_dir` is added.
pub fn load_document(
    ctx: &ResolveContext,
    details: &ConfigDetails,
    options: &LoadOptions,
) -> Result<Document, ExtendsError> {
    let options = if options.has_local_loader() {
        options.clone()
    } else {
        options.clone().with_loader(Arc::new(LocalResourceLoader::new(&details.working_dir)))
    };

    let mut combined: Option<Document> = None;
    for file in &details.config_files {
        ctx.checkpoint()?;
        let document = load_file(ctx, file, &details.working_dir, &options, &mut Vec::new())?;
        combined = Some(match combined {
            None => document,
            Some(base) => combine(base, document, options.merger.as_ref())?,
        });
    }
    let mut document = combined.unwrap_or_default();

    if !options.skip_normalization {
        normalize(&mut document)?;
    }
    if !options.skip_default_values {
        apply_defaults(&mut document);
    }
    if !options.skip_validation {
        validate(&document)?;
    }
    Ok(document)
}

/// Run the per-file stages for one file.
///
/// `include_stack` holds the identities of the files currently being
/// included, outermost first.
pub(super) fn load_file(
    ctx: &ResolveContext,
    file: &ConfigFile,
    working_dir: &Path,
    options: &LoadOptions,
    include_stack: &mut Vec<String>,
) -> Result<Document, ExtendsError> {
    let (identity, dir, mut document) = match &file.content {
        Some(content) => (file.filename.clone(), working_dir.to_path_buf(), parse(&file.filename, content)?),
        None => {
            let path = absolute(working_dir, &file.filename);
            let content = std::fs::read_to_string(&path).map_err(|source| ExtendsError::Read {
                path: path.clone(),
                source,
            })?;
            let identity = path.display().to_string();
            let document = parse(&identity, &content)?;
            let dir = path.parent().map_or_else(|| working_dir.to_path_buf(), Path::to_path_buf);
            (identity, dir, document)
        }
    };
    tracing::debug!(target: "loader", "Loaded {identity}");

    let reset = Arc::new(ResetProcessor::new());
    reset.record(&mut document);

    if !options.skip_interpolation {
        interpolate(&mut document, &options.interpolation)?;
    }
    if !options.skip_include {
        include::apply_includes(ctx, &mut document, &identity, &dir, options, include_stack)?;
    }
    if !options.skip_extends {
        ExtendsResolver::new(options.clone()).with_post_processor(reset).resolve(ctx, &mut document, &identity)?;
    }
    Ok(document)
}

fn absolute(working_dir: &Path, filename: &str) -> PathBuf {
    let path = working_dir.join(filename);
    path.canonicalize().unwrap_or(path)
}

fn parse(identity: &str, content: &str) -> Result<Document, ExtendsError> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(content).map_err(|source| ExtendsError::Parse {
        file: identity.to_string(),
        source,
    })?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(document) => Ok(document),
        _ => Err(ExtendsError::not_a_mapping(format!("top-level object of {identity}"))),
    }
}

/// Lay `overlay` over `base`.
///
/// Services present in both are merged with `merger`, other top-level keys
/// of `overlay` replace those of `base`.
fn combine(mut base: Document, mut overlay: Document, merger: &dyn Merger) -> Result<Document, ExtendsError> {
    let overlay_services = take_services(&mut overlay)?;
    for (key, value) in overlay {
        if key.as_str() != Some(SERVICES_KEY) {
            base.insert(key, value);
        }
    }

    let Some(overlay_services) = overlay_services else {
        return Ok(base);
    };
    let mut services = take_services(&mut base)?.unwrap_or_default();
    for (key, service) in overlay_services {
        match services.get_mut(&key) {
            Some(slot) => {
                let current = std::mem::replace(slot, Value::Null);
                *slot = merge_service(&key_segment(&key), current, service, merger)?;
            }
            None => {
                services.insert(key, service);
            }
        }
    }
    base.insert(SERVICES_KEY.into(), Value::Mapping(services));
    Ok(base)
}

fn merge_service(name: &str, base: Value, overlay: Value, merger: &dyn Merger) -> Result<Value, ExtendsError> {
    let as_mapping = |value: Value| match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(service) => Ok(service),
        _ => Err(ExtendsError::not_a_mapping(format!("{SERVICES_KEY}.{name}"))),
    };
    Ok(Value::Mapping(merger.merge(name, as_mapping(base)?, as_mapping(overlay)?)?))
}
