//! Normalization and default values for the final document.

use serde_yaml::{Mapping, Sequence, Value};

use crate::core::ExtendsError;
use crate::document::{Document, SERVICES_KEY, key_segment, untag};

/// Fields accepted either as a mapping or as a list of `KEY=VALUE`.
const KEY_VALUE_FIELDS: &[&str] = &["environment", "labels"];

/// Bring the document to its canonical shape.
///
/// - remaining YAML tags are dropped, keeping the tagged values
/// - `build: <path>` becomes `build: {context: <path>}`
/// - `environment` and `labels` lists become mappings
pub fn normalize(document: &mut Document) -> Result<(), ExtendsError> {
    for (_, value) in document.iter_mut() {
        untag(value);
    }

    let Some(services) = document.get_mut(SERVICES_KEY) else {
        return Ok(());
    };
    let services = match services {
        Value::Null => return Ok(()),
        Value::Mapping(services) => services,
        _ => return Err(ExtendsError::not_a_mapping(SERVICES_KEY)),
    };

    for (key, service) in services.iter_mut() {
        let Value::Mapping(service) = service else {
            continue;
        };
        let name = key_segment(key);

        if let Some(build) = service.get_mut("build") {
            if let Value::String(context) = build {
                let context = std::mem::take(context);
                let mut expanded = Mapping::new();
                expanded.insert("context".into(), Value::String(context));
                *build = Value::Mapping(expanded);
            }
        }

        for field in KEY_VALUE_FIELDS {
            if let Some(value) = service.get_mut(*field) {
                if let Value::Sequence(items) = value {
                    let location = format!("{SERVICES_KEY}.{name}.{field}");
                    *value = Value::Mapping(list_to_mapping(std::mem::take(items), &location)?);
                }
            }
        }
    }
    Ok(())
}

/// Fill in the values a service gets when it does not set them.
///
/// `build.context` defaults to `.` and `build.dockerfile` to `Dockerfile`
/// unless an inline Dockerfile is given.
pub fn apply_defaults(document: &mut Document) {
    let Some(Value::Mapping(services)) = document.get_mut(SERVICES_KEY) else {
        return;
    };
    for (_, service) in services.iter_mut() {
        let Some(Value::Mapping(build)) = service.get_mut("build") else {
            continue;
        };
        if !build.contains_key("context") {
            build.insert("context".into(), ".".into());
        }
        if !build.contains_key("dockerfile") && !build.contains_key("dockerfile_inline") {
            build.insert("dockerfile".into(), "Dockerfile".into());
        }
    }
}

fn list_to_mapping(items: Sequence, location: &str) -> Result<Mapping, ExtendsError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(entry) => Ok(match entry.split_once('=') {
                Some((key, value)) => (Value::from(key), Value::from(value)),
                None => (Value::String(entry), Value::Null),
            }),
            _ => Err(ExtendsError::not_a_string(format!("{location}[]"))),
        })
        .collect()
}
