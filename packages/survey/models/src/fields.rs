//! Field-name truncation for legacy attribute storage.
//!
//! Attribute tables of the persisted layers cap field names at
//! [`MAX_FIELD_NAME_LEN`] characters. Truncation is checked for collisions
//! so two distinct source fields never end up under the same name.

use std::collections::BTreeMap;

/// Maximum field name length, in characters.
pub const MAX_FIELD_NAME_LEN: usize = 10;

/// Truncates `name` to at most [`MAX_FIELD_NAME_LEN`] characters.
#[must_use]
pub fn truncate_field_name(name: &str) -> String {
    name.chars().take(MAX_FIELD_NAME_LEN).collect()
}

/// Suffix marking a joined field renamed because its short name was taken.
pub const RENAME_SUFFIX: &str = "_1";

/// Returns the short name `name` takes when its own short name is taken.
///
/// The source name is cut so the suffixed result still fits in
/// [`MAX_FIELD_NAME_LEN`] characters.
#[must_use]
pub fn renamed_field_name(name: &str) -> String {
    let base: String = name
        .chars()
        .take(MAX_FIELD_NAME_LEN - RENAME_SUFFIX.len())
        .collect();
    format!("{base}{RENAME_SUFFIX}")
}

/// Truncates every name, failing if two names collapse to the same result.
///
/// # Errors
///
/// Returns [`FieldNameCollision`] naming both source fields when their
/// truncated forms are equal.
pub fn truncate_field_names(names: &[String]) -> Result<Vec<String>, FieldNameCollision> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut truncated = Vec::with_capacity(names.len());

    for name in names {
        let short = truncate_field_name(name);
        if let Some(first) = seen.get(&short) {
            return Err(FieldNameCollision {
                truncated: short,
                first: (*first).to_string(),
                second: name.clone(),
            });
        }
        seen.insert(short.clone(), name);
        truncated.push(short);
    }

    Ok(truncated)
}

/// Finds `name` in `fields`, falling back to its truncated form.
///
/// Lets callers keep using source names such as `SamplerName` against a
/// schema that stores `SamplerNam`.
#[must_use]
pub fn field_position(fields: &[String], name: &str) -> Option<usize> {
    fields.iter().position(|f| f == name).or_else(|| {
        let short = truncate_field_name(name);
        fields.iter().position(|f| *f == short)
    })
}

/// Error returned when two field names truncate to the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNameCollision {
    /// The shared truncated name.
    pub truncated: String,
    /// The field that claimed the truncated name first.
    pub first: String,
    /// The field that collided with it.
    pub second: String,
}

impl std::fmt::Display for FieldNameCollision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fields '{}' and '{}' both truncate to '{}'",
            self.first, self.second, self.truncated
        )
    }
}

impl std::error::Error for FieldNameCollision {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate_field_name("Surveycount"), "Surveycoun");
        assert_eq!(truncate_field_name("SamplerName"), "SamplerNam");
        assert_eq!(truncate_field_name("DeviceTime"), "DeviceTime");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_field_name("Überwachungsort"), "Überwachun");
    }

    #[test]
    fn detects_collisions() {
        let err = truncate_field_names(&names(&["Observation1", "Observation2"])).unwrap_err();
        assert_eq!(err.truncated, "Observatio");
        assert_eq!(err.first, "Observation1");
        assert_eq!(err.second, "Observation2");
    }

    #[test]
    fn keeps_order_without_collisions() {
        let out = truncate_field_names(&names(&["Latitude", "Surveycount", "Quality"])).unwrap();
        assert_eq!(out, names(&["Latitude", "Surveycoun", "Quality"]));
    }

    #[test]
    fn renamed_names_fit_the_limit() {
        assert_eq!(renamed_field_name("STOCK"), "STOCK_1");
        assert_eq!(renamed_field_name("SamplerName"), "SamplerN_1");
        assert_eq!(renamed_field_name("Join_Count"), "Join_Cou_1");
    }

    #[test]
    fn position_prefers_exact_then_truncated() {
        let fields = names(&["SamplerNam", "Quality"]);
        assert_eq!(field_position(&fields, "SamplerName"), Some(0));
        assert_eq!(field_position(&fields, "Quality"), Some(1));
        assert_eq!(field_position(&fields, "Species"), None);
    }
}
