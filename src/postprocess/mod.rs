//! Deferred post-processors.
//!
//! A [`PostProcessor`] is re-applied by the inheritance resolver to a copy
//! of each base service relocated under the name of the service extending
//! it, as the fragment `{services: {<child>: <base>}}`. Effects recorded
//! against the child's name therefore also reach what it inherits.
//!
//! [`ResetProcessor`] is the one the load pipeline registers: it removes
//! `!reset` values while a file is loaded and later strips the same paths
//! from relocated bases, so `ports: !reset []` on a child drops the ports
//! it would otherwise inherit.

use serde_yaml::{Mapping, Sequence, Value};
use std::sync::{Mutex, PoisonError};

use crate::document::key_segment;
use crate::interpolation::Path;

/// Tag marking a value to be removed, including from inherited bases.
pub const RESET_TAG: &str = "reset";

/// Hook re-applied to relocated document fragments.
pub trait PostProcessor: Send + Sync {
    /// Apply to `fragment`, a document holding a single service.
    fn apply(&self, fragment: &mut Mapping);
}

/// Handles `!reset` tags.
#[derive(Debug, Default)]
pub struct ResetProcessor {
    paths: Mutex<Vec<Path>>,
}

impl ResetProcessor {
    /// A processor with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every `!reset` value from `document`, remembering where it was.
    pub fn record(&self, document: &mut Mapping) {
        let mut found = Vec::new();
        record_mapping(document, &Path::default(), &mut found);
        if !found.is_empty() {
            tracing::trace!(target: "extends", "recorded {} reset path(s)", found.len());
            self.lock().extend(found);
        }
    }

    /// Paths recorded so far.
    pub fn paths(&self) -> Vec<Path> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Path>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PostProcessor for ResetProcessor {
    fn apply(&self, fragment: &mut Mapping) {
        let paths = self.lock();
        if !paths.is_empty() {
            remove_mapping(fragment, &Path::default(), &paths);
        }
    }
}

fn is_reset(value: &Value) -> bool {
    matches!(value, Value::Tagged(tagged) if tagged.tag == RESET_TAG)
}

fn record_mapping(mapping: &mut Mapping, path: &Path, found: &mut Vec<Path>) {
    mapping.retain(|key, value| {
        let next = path.next(&key_segment(key));
        if is_reset(value) {
            found.push(next);
            return false;
        }
        record_value(value, &next, found);
        true
    });
}

fn record_sequence(items: &mut Sequence, path: &Path, found: &mut Vec<Path>) {
    let mut index = 0;
    items.retain_mut(|item| {
        let next = path.next(&format!("[{index}]"));
        index += 1;
        if is_reset(item) {
            found.push(next);
            return false;
        }
        record_value(item, &next, found);
        true
    });
}

fn record_value(value: &mut Value, path: &Path, found: &mut Vec<Path>) {
    match value {
        Value::Mapping(mapping) => record_mapping(mapping, path, found),
        Value::Sequence(items) => record_sequence(items, path, found),
        Value::Tagged(tagged) => record_value(&mut tagged.value, path, found),
        _ => {}
    }
}

fn remove_mapping(mapping: &mut Mapping, path: &Path, patterns: &[Path]) {
    mapping.retain(|key, value| {
        let next = path.next(&key_segment(key));
        if patterns.iter().any(|pattern| next.matches(pattern)) {
            return false;
        }
        remove_value(value, &next, patterns);
        true
    });
}

fn remove_value(value: &mut Value, path: &Path, patterns: &[Path]) {
    match value {
        Value::Mapping(mapping) => remove_mapping(mapping, path, patterns),
        Value::Sequence(items) => {
            let mut index = 0;
            items.retain_mut(|item| {
                let next = path.next(&format!("[{index}]"));
                index += 1;
                if patterns.iter().any(|pattern| next.matches(pattern)) {
                    return false;
                }
                remove_value(item, &next, patterns);
                true
            });
        }
        Value::Tagged(tagged) => remove_value(&mut tagged.value, path, patterns),
        _ => {}
    }
}
