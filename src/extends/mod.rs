//! Service inheritance resolution.
//!
//! A service may declare that it extends another one, either in the same
//! file or in another file reached through a [`ResourceLoader`]:
//!
//! ```yaml
//! services:
//!   web:
//!     extends: base                # same file
//!   worker:
//!     extends:
//!       service: app
//!       file: common/services.yml  # another file
//! ```
//!
//! [`ExtendsResolver::resolve`] replaces every service of a document with
//! its fully merged definition. For each service the resolver:
//!
//! 1. looks up the base, fetching the other file with a restricted load
//!    when `extends.file` is set;
//! 2. records `(file, service)` in a [`ChainTracker`], failing on a revisit;
//! 3. resolves the base itself, recursively;
//! 4. clones the resolved base and runs the registered
//!    [`PostProcessor`]s on it, relocated under the extending service's name;
//! 5. merges the child over the base and drops the `extends` key.
//!
//! Nothing is written back until every service of the document resolved,
//! so a failure leaves the document untouched.
//!
//! [`ResourceLoader`]: crate::loader::ResourceLoader

mod fetch;
mod tracker;

pub use tracker::{ChainEntry, ChainTracker};

use serde_yaml::{Mapping, Value};
use std::borrow::Cow;
use std::sync::Arc;
use strsim::levenshtein;

use crate::core::{ExtendsError, ResolveContext};
use crate::document::{
    Document, EXTENDS_KEY, ExtendsReference, SERVICES_KEY, expect_mapping, key_segment, services,
    string_keyed, structural_clone_mapping,
};
use crate::loader::LoadOptions;
use crate::postprocess::PostProcessor;

/// Maximum edit distance, as a percentage of the name length, for a
/// "did you mean" suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Resolves `extends` directives of a document.
pub struct ExtendsResolver {
    options: LoadOptions,
    post_processors: Vec<Arc<dyn PostProcessor>>,
}

impl ExtendsResolver {
    /// A resolver using `options` for loaders, merger and depth limit.
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            post_processors: Vec::new(),
        }
    }

    /// Register a post-processor applied to every relocated base.
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Resolve every service of `document` in place.
    ///
    /// `file` is the identity of the document, used for cycle detection and
    /// error messages. A document without `services` is left unchanged.
    pub fn resolve(&self, ctx: &ResolveContext, document: &mut Document, file: &str) -> Result<(), ExtendsError> {
        let Some(original) = services(document)? else {
            return Ok(());
        };
        let scope = string_keyed(original);

        let mut resolved = Vec::new();
        for (key, name) in original.keys().zip(scope.keys()) {
            let name = key_segment(name);
            if let Some(Cow::Owned(merged)) =
                self.resolve_one(ctx, &name, &scope, file, &ChainTracker::new(), &self.options)?
            {
                resolved.push((key.clone(), merged));
            }
        }

        if resolved.is_empty() {
            return Ok(());
        }
        tracing::debug!(target: "extends", "Resolved {} extending service(s) in {file}", resolved.len());
        if let Some(Value::Mapping(scope)) = document.get_mut(SERVICES_KEY) {
            for (key, merged) in resolved {
                scope.insert(key, Value::Mapping(merged));
            }
        }
        Ok(())
    }

    /// Resolve service `name` within `scope`, the services of `file`.
    ///
    /// Returns `None` when the service has no definition, the definition
    /// itself when it extends nothing, and the merged definition otherwise.
    fn resolve_one<'s>(
        &self,
        ctx: &ResolveContext,
        name: &str,
        scope: &'s Mapping,
        file: &str,
        tracker: &ChainTracker,
        options: &LoadOptions,
    ) -> Result<Option<Cow<'s, Mapping>>, ExtendsError> {
        ctx.checkpoint()?;

        let service = match scope.get(name) {
            None | Some(Value::Null) => return Ok(None),
            Some(service) => expect_mapping(service, &format!("{SERVICES_KEY}.{name}"))?,
        };
        let Some(reference) = ExtendsReference::from_service(name, service)? else {
            return Ok(Some(Cow::Borrowed(service)));
        };
        let target = reference.service_name.as_str();

        let fetched;
        let (base_scope, base_file, base_options) = match &reference.file_name {
            Some(path) => {
                fetched = fetch::fetch_base(ctx, name, target, path, options)?;
                (&fetched.services, fetched.file.as_str(), &fetched.options)
            }
            None => {
                if !scope.contains_key(target) {
                    return Err(ExtendsError::ServiceNotFound {
                        service: name.to_string(),
                        target: target.to_string(),
                        file: file.to_string(),
                        suggestion: closest_service(target, scope),
                    });
                }
                (scope, file, options)
            }
        };

        let tracker = tracker.add(file, name)?;
        if tracker.len() > options.max_depth {
            return Err(ExtendsError::DepthExceeded {
                service: name.to_string(),
                max_depth: options.max_depth,
            });
        }

        tracing::debug!(target: "extends", "{file}:{name} extends {base_file}:{target}");
        let Some(base) = self.resolve_one(ctx, target, base_scope, base_file, &tracker, base_options)? else {
            tracing::trace!(target: "extends", "{base_file}:{target} has no definition, keeping {name} as is");
            return Ok(Some(Cow::Borrowed(service)));
        };

        let source = self.relocate(name, structural_clone_mapping(&base));
        let mut merged = options.merger.merge(name, source, service.clone())?;
        merged.shift_remove(EXTENDS_KEY);
        Ok(Some(Cow::Owned(merged)))
    }

    /// Run the post-processors on `base` placed under `name`.
    fn relocate(&self, name: &str, base: Mapping) -> Mapping {
        if self.post_processors.is_empty() {
            return base;
        }

        let mut services = Mapping::new();
        services.insert(name.into(), Value::Mapping(base));
        let mut fragment = Mapping::new();
        fragment.insert(SERVICES_KEY.into(), Value::Mapping(services));

        for processor in &self.post_processors {
            processor.apply(&mut fragment);
        }

        match fragment.shift_remove(SERVICES_KEY) {
            Some(Value::Mapping(mut services)) => match services.shift_remove(name) {
                Some(Value::Mapping(base)) => base,
                _ => {
                    tracing::warn!(target: "extends", "A post-processor removed the base of \"{name}\"");
                    Mapping::new()
                }
            },
            _ => {
                tracing::warn!(target: "extends", "A post-processor removed the services of \"{name}\"");
                Mapping::new()
            }
        }
    }
}

/// The service name in `scope` closest to `target`, if close enough.
pub(crate) fn closest_service(target: &str, scope: &Mapping) -> Option<String> {
    let limit = target.len() * SIMILARITY_THRESHOLD_PERCENT / 100;
    scope
        .keys()
        .filter_map(Value::as_str)
        .map(|candidate| (candidate, levenshtein(target, candidate)))
        .filter(|(_, distance)| *distance <= limit)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.to_string())
}
