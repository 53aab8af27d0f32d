//! Fetching base services from another file.

use serde_yaml::Mapping;
use std::path::Path;

use super::closest_service;
use crate::core::{ExtendsError, ResolveContext};
use crate::document::{string_keyed, take_services};
use crate::loader::{ConfigDetails, ConfigFile, LoadOptions, load_document, materialize, select_loader};

/// Services harvested from the file an `extends.file` points to.
pub(super) struct FetchedBase {
    /// The raw service map of the file, keyed by name
    pub services: Mapping,
    /// Identity of the materialized file
    pub file: String,
    /// Options for resolving inside that file
    pub options: LoadOptions,
}

/// Load `path` with a restricted pipeline and return its services.
///
/// The nested load runs without extends, includes, normalization, default
/// values or validation; the caller resolves the fetched service's own
/// `extends` with the returned, unrestricted options.
pub(super) fn fetch_base(
    ctx: &ResolveContext,
    extending: &str,
    target: &str,
    path: &str,
    options: &LoadOptions,
) -> Result<FetchedBase, ExtendsError> {
    let loader = select_loader(options, path)?;
    let local = materialize(ctx, loader.as_ref(), path)?;
    let local_dir = local.parent().map(Path::to_path_buf).unwrap_or_default();
    let file = local.display().to_string();

    tracing::debug!(target: "extends", "Fetching service \"{target}\" from {file}");
    let details = ConfigDetails::new(loader.dir(path), vec![ConfigFile::new(file.clone())]);
    let mut document = load_document(ctx, &details, &options.restricted(&local_dir))?;
    let services = take_services(&mut document)?.unwrap_or_default();
    let services = string_keyed(&services).into_owned();

    if !services.contains_key(target) {
        return Err(ExtendsError::ServiceNotFound {
            service: extending.to_string(),
            target: target.to_string(),
            file: path.to_string(),
            suggestion: closest_service(target, &services),
        });
    }

    Ok(FetchedBase {
        services,
        file,
        options: options.rebased(&local_dir),
    })
}
