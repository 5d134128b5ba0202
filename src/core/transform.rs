// LogTrail - core/transform.rs
//
// Field value rewriting: exact-match substitution followed by template
// formatting. Pure functions, no state.

use crate::core::model::FieldTransform;
use crate::util::constants::TRANSFORM_VALUE_PLACEHOLDER;

/// Apply the transform targeting `field` (exact name match) to `value`.
///
/// The map is consulted first with the raw value; the format template then
/// receives the possibly mapped value. Fields without a transform are
/// returned unchanged.
pub fn apply(value: &str, field: &str, transforms: &[FieldTransform]) -> String {
    let Some(transform) = transforms.iter().find(|t| t.field == field) else {
        return value.to_string();
    };

    let mapped = transform
        .map
        .as_ref()
        .and_then(|map| map.get(value))
        .map(String::as_str)
        .unwrap_or(value);

    match transform.format.as_deref() {
        Some(template) if !template.is_empty() => {
            template.replace(TRANSFORM_VALUE_PLACEHOLDER, mapped)
        }
        _ => mapped.to_string(),
    }
}
