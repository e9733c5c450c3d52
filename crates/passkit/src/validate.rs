//! Pre-generation checks.
//!
//! Runs synchronously against the field map and the image slots before any
//! image is read. Fields are checked first (presence, then the type of
//! `passTypeIdentifier`, which names the signing key), then images, and the
//! first gap found is reported by name.

use crate::error::ValidationError;
use crate::images::{ImageRole, ImageSet};
use crate::pass::fields::{is_blank, FieldMap, TemplateField, REQUIRED_FIELDS};
use serde_json::Value;

/// Checks that every required field and image is present.
///
/// A field counts as missing when it is absent, `null`, or an empty string.
/// An image counts as present when its role has a base-resolution source;
/// high-resolution variants alone are not enough.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] for the first missing field, or
/// [`ValidationError::MissingImage`] for the first missing image if all
/// fields are present.
pub fn validate(fields: &FieldMap, images: &ImageSet) -> std::result::Result<(), ValidationError> {
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|key| is_blank(fields.get(**key)))
    {
        return Err(ValidationError::MissingField(*missing));
    }

    let pass_type_identifier = TemplateField::PassTypeIdentifier.as_str();
    if !fields.get(pass_type_identifier).is_some_and(Value::is_string) {
        return Err(ValidationError::NotAString(pass_type_identifier));
    }

    if let Some(missing) = ImageRole::REQUIRED
        .iter()
        .find(|role| !images.contains(**role))
    {
        return Err(ValidationError::MissingImage(missing.as_str()));
    }

    Ok(())
}
