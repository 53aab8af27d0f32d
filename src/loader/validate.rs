//! Validation of the final document.

use crate::core::ExtendsError;
use crate::document::{Document, EXTENDS_KEY, SERVICES_KEY, expect_mapping, key_segment, services};

/// Check that every service is usable.
///
/// Each service must be a mapping, must name an `image` or a `build`, and
/// must not carry an `extends` left over from resolution.
pub fn validate(document: &Document) -> Result<(), ExtendsError> {
    let Some(services) = services(document)? else {
        return Ok(());
    };

    for (key, service) in services {
        let name = key_segment(key);
        let service = expect_mapping(service, &format!("{SERVICES_KEY}.{name}"))?;

        if service.contains_key(EXTENDS_KEY) {
            return Err(ExtendsError::Validation {
                reason: format!("service \"{name}\" still declares extends"),
            });
        }
        if !service.contains_key("image") && !service.contains_key("build") {
            return Err(ExtendsError::Validation {
                reason: format!("service \"{name}\" has neither an image nor a build context specified"),
            });
        }
    }
    Ok(())
}
