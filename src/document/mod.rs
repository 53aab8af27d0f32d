//! Typed access to parsed configuration documents.
//!
//! Documents are kept as [`serde_yaml::Mapping`] trees so that any shape the
//! file format allows can be carried through resolution untouched. Every
//! place that needs a particular shape goes through a fallible accessor here,
//! turning a wrong shape into [`ExtendsError::Shape`] naming the dotted
//! location.

mod clone;

pub use clone::{structural_clone, structural_clone_mapping};

use serde_yaml::{Mapping, Value};
use std::borrow::Cow;

use crate::core::ExtendsError;

/// A parsed configuration file.
pub type Document = Mapping;

/// Key holding the service map of a document.
pub const SERVICES_KEY: &str = "services";

/// Key holding the inheritance directive of a service.
pub const EXTENDS_KEY: &str = "extends";

/// Render a mapping key as a path segment.
pub fn key_segment(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other).map(|s| s.trim_end().to_string()).unwrap_or_default(),
    }
}

/// `mapping` with every key rendered as a string, order preserved.
///
/// Service names are looked up by string, so a key such as `1:` (a YAML
/// number) must be addressable as `"1"`. Borrows when all keys already are
/// strings.
pub fn string_keyed(mapping: &Mapping) -> Cow<'_, Mapping> {
    if mapping.keys().all(Value::is_string) {
        return Cow::Borrowed(mapping);
    }
    Cow::Owned(
        mapping
            .iter()
            .map(|(key, value)| (Value::String(key_segment(key)), value.clone()))
            .collect(),
    )
}

/// Drop every YAML tag in `value`, at any depth.
pub fn untag(value: &mut Value) {
    if let Value::Tagged(tagged) = value {
        let inner = std::mem::replace(&mut tagged.value, Value::Null);
        *value = inner;
        untag(value);
        return;
    }
    match value {
        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                untag(item);
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(untag),
        _ => {}
    }
}

/// Borrow `value` as a mapping or fail with a shape error at `location`.
pub fn expect_mapping<'a>(value: &'a Value, location: &str) -> Result<&'a Mapping, ExtendsError> {
    value.as_mapping().ok_or_else(|| ExtendsError::not_a_mapping(location))
}

/// Borrow `value` as a string or fail with a shape error at `location`.
pub fn expect_str<'a>(value: &'a Value, location: &str) -> Result<&'a str, ExtendsError> {
    value.as_str().ok_or_else(|| ExtendsError::not_a_string(location))
}

/// The `services` mapping of a document.
///
/// `Ok(None)` when the key is absent or null: inheritance is optional.
pub fn services(document: &Document) -> Result<Option<&Mapping>, ExtendsError> {
    match document.get(SERVICES_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => expect_mapping(value, SERVICES_KEY).map(Some),
    }
}

/// Remove and return the `services` mapping of a document.
pub fn take_services(document: &mut Document) -> Result<Option<Mapping>, ExtendsError> {
    let Some(slot) = document.get_mut(SERVICES_KEY) else {
        return Ok(None);
    };
    match std::mem::replace(slot, Value::Null) {
        Value::Null => Ok(None),
        Value::Mapping(services) => Ok(Some(services)),
        other => {
            *slot = other;
            Err(ExtendsError::not_a_mapping(SERVICES_KEY))
        }
    }
}

/// Reference from a service to the base it extends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendsReference {
    /// Name of the base service
    pub service_name: String,
    /// File holding the base service, `None` for the same file
    pub file_name: Option<String>,
}

impl ExtendsReference {
    /// Inspect the `extends` key of service `name`.
    ///
    /// Accepts a bare string (same-file service) or a mapping with a required
    /// `service` and an optional `file`. Returns `Ok(None)` when the service
    /// does not extend anything.
    pub fn from_service(name: &str, service: &Mapping) -> Result<Option<Self>, ExtendsError> {
        let Some(extends) = service.get(EXTENDS_KEY) else {
            return Ok(None);
        };
        let location = format!("{SERVICES_KEY}.{name}.{EXTENDS_KEY}");

        match extends {
            Value::String(service_name) => Ok(Some(Self {
                service_name: service_name.clone(),
                file_name: None,
            })),
            Value::Mapping(reference) => {
                let service_name = reference
                    .get("service")
                    .ok_or_else(|| ExtendsError::not_a_string(format!("{location}.service")))
                    .and_then(|v| expect_str(v, &format!("{location}.service")))?;
                let file_name = match reference.get("file") {
                    None | Some(Value::Null) => None,
                    Some(file) => Some(expect_str(file, &format!("{location}.file"))?.to_string()),
                };
                Ok(Some(Self {
                    service_name: service_name.to_string(),
                    file_name,
                }))
            }
            _ => Err(ExtendsError::Shape {
                location,
                expected: "string or mapping",
            }),
        }
    }
}
