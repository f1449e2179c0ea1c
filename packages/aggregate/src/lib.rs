#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Summary statistics grouped by stock, species, section, and observer.
//!
//! Every joined feature contributes to exactly one group, including
//! features that matched no boundary polygon. Stock, species, and section
//! come from the matched polygon only, so those features carry none of the
//! three and form groups of their own.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use escapement_map_survey_models::{FieldValue, JoinedFeature, JoinedLayer, SummaryRow};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while summarizing a joined layer.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A configured source field is absent from the joined layer.
    #[error("Summary field '{field}' ({role}) is not present in the joined layer")]
    MissingField {
        /// Configured field name.
        field: String,
        /// What the field is used for (e.g. `"count"`).
        role: &'static str,
    },
}

/// Source field names feeding the summary.
///
/// Names may be given untruncated; they resolve against the joined
/// layer's short field names. `stock`, `species`, and `sect_code` name
/// boundary attributes; the rest name survey fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SummaryFields {
    /// Stock grouping key.
    pub stock: String,
    /// Species grouping key.
    pub species: String,
    /// Stream section grouping key.
    pub sect_code: String,
    /// Observer grouping key.
    pub sampler_name: String,
    /// Fish count summed per group.
    pub count: String,
    /// Quality rating averaged per group.
    pub rating: String,
    /// Device timestamp minimized per group.
    pub device_time: String,
}

impl Default for SummaryFields {
    fn default() -> Self {
        Self {
            stock: "STOCK".to_string(),
            species: "Species".to_string(),
            sect_code: "Sect_Code".to_string(),
            sampler_name: "SamplerName".to_string(),
            count: "Surveycount".to_string(),
            rating: "Quality".to_string(),
            device_time: "DeviceTime".to_string(),
        }
    }
}

impl SummaryFields {
    fn polygon_roles(&self) -> [(&str, &'static str); 3] {
        [
            (self.stock.as_str(), "stock"),
            (self.species.as_str(), "species"),
            (self.sect_code.as_str(), "section code"),
        ]
    }

    fn point_roles(&self) -> [(&str, &'static str); 4] {
        [
            (self.sampler_name.as_str(), "sampler name"),
            (self.count.as_str(), "count"),
            (self.rating.as_str(), "rating"),
            (self.device_time.as_str(), "device time"),
        ]
    }
}

/// Grouping key. `None` components sort before any value.
type GroupKey = (Option<String>, Option<String>, Option<String>, Option<String>);

#[derive(Default)]
struct Accumulator {
    frequency: u64,
    sum_count: f64,
    rating_total: f64,
    rating_n: u64,
    first_device_time: Option<NaiveDateTime>,
}

/// Groups `layer` by (stock, species, section, observer) and reduces each
/// group.
///
/// Rows are ordered by key, component by component, with missing
/// components first. Missing counts add nothing to `sum_count`, missing
/// ratings are excluded from the mean (an all-missing group has no mean),
/// and missing timestamps are excluded from the minimum.
///
/// A key the boundary polygons do not carry (for example because the
/// boundary collection is empty) is missing for every feature.
///
/// # Errors
///
/// Returns [`AggregateError::MissingField`] if a configured survey field
/// does not exist in `layer`.
pub fn summarize(
    layer: &JoinedLayer,
    fields: &SummaryFields,
) -> Result<Vec<SummaryRow>, AggregateError> {
    for (field, role) in fields.polygon_roles() {
        if !layer.has_polygon_field(field) {
            log::warn!(
                "Boundary polygons have no {field} attribute, {role} is missing for every group"
            );
        }
    }

    for (field, role) in fields.point_roles() {
        if !layer.has_field(field) {
            return Err(AggregateError::MissingField {
                field: field.to_string(),
                role,
            });
        }
    }

    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

    for feature in &layer.features {
        let key = (
            polygon_key(layer, feature, &fields.stock),
            polygon_key(layer, feature, &fields.species),
            polygon_key(layer, feature, &fields.sect_code),
            key_value(layer, feature, &fields.sampler_name),
        );
        let acc = groups.entry(key).or_default();

        acc.frequency += 1;

        if let Some(count) = numeric(layer, feature, &fields.count) {
            acc.sum_count += count;
        }

        if let Some(rating) = numeric(layer, feature, &fields.rating) {
            acc.rating_total += rating;
            acc.rating_n += 1;
        }

        if let Some(time) = timestamp(layer, feature, &fields.device_time) {
            acc.first_device_time = Some(acc.first_device_time.map_or(time, |t| t.min(time)));
        }
    }

    let rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|((stock, species, sect_code, sampler_name), acc)| SummaryRow {
            stock,
            species,
            sect_code,
            sampler_name,
            frequency: acc.frequency,
            sum_count: acc.sum_count,
            mean_overall_rating: mean(acc.rating_total, acc.rating_n),
            first_device_time: acc.first_device_time,
        })
        .collect();

    log::info!(
        "Summarized {} features into {} groups",
        layer.features.len(),
        rows.len()
    );

    Ok(rows)
}

#[allow(clippy::cast_precision_loss)]
fn mean(total: f64, n: u64) -> Option<f64> {
    (n > 0).then(|| total / n as f64)
}

fn polygon_key(layer: &JoinedLayer, feature: &JoinedFeature, field: &str) -> Option<String> {
    layer
        .polygon_value(feature, field)
        .and_then(FieldValue::key_string)
}

fn key_value(layer: &JoinedLayer, feature: &JoinedFeature, field: &str) -> Option<String> {
    layer
        .value(feature, field)
        .and_then(|value| value.key_string())
}

fn numeric(layer: &JoinedLayer, feature: &JoinedFeature, field: &str) -> Option<f64> {
    let value = layer.value(feature, field)?;
    match &*value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Missing => None,
        other => {
            log::warn!(
                "{}: {field} value {other:?} is not numeric, treating as missing",
                feature.point.identifier()
            );
            None
        }
    }
}

fn timestamp(layer: &JoinedLayer, feature: &JoinedFeature, field: &str) -> Option<NaiveDateTime> {
    let value = layer.value(feature, field)?;
    match &*value {
        FieldValue::Timestamp(t) => Some(*t),
        FieldValue::Missing => None,
        other => {
            log::warn!(
                "{}: {field} value {other:?} is not a timestamp, treating as missing",
                feature.point.identifier()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use escapement_map_survey_models::{PointFeature, SurveyRecord};

    use super::*;

    fn at(hour: u32) -> FieldValue {
        FieldValue::Timestamp(
            NaiveDate::from_ymd_opt(2023, 9, 14)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    /// Builds a feature from (sampler, count, quality, time) and an optional
    /// (stock, species, section) match.
    fn feature(
        line: usize,
        point: [FieldValue; 4],
        polygon: Option<(&str, &str, f64)>,
    ) -> JoinedFeature {
        let record = SurveyRecord {
            source_line: line,
            label: None,
            values: point.to_vec(),
        };
        let (polygon_values, join_count) = match polygon {
            Some((stock, species, sect)) => (
                vec![text(stock), text(species), FieldValue::Number(sect)],
                1,
            ),
            None => (vec![FieldValue::Missing; 3], 0),
        };
        JoinedFeature {
            point: PointFeature::new(record, -123.0, 49.0),
            polygon_values,
            polygon_ordinal: (join_count == 1).then_some(0),
            join_count,
        }
    }

    fn layer(features: Vec<JoinedFeature>) -> JoinedLayer {
        JoinedLayer {
            point_fields: vec![
                "SamplerNam".to_string(),
                "Surveycoun".to_string(),
                "Quality".to_string(),
                "DeviceTime".to_string(),
            ],
            polygon_fields: vec![
                "STOCK".to_string(),
                "Species".to_string(),
                "Sect_Code".to_string(),
            ],
            features,
        }
    }

    fn survey() -> JoinedLayer {
        layer(vec![
            feature(
                2,
                [text("Smith"), FieldValue::Number(10.0), FieldValue::Number(4.0), at(9)],
                Some(("X", "Chum", 12.0)),
            ),
            feature(
                3,
                [text("Smith"), FieldValue::Number(5.0), FieldValue::Number(2.0), at(8)],
                Some(("X", "Chum", 12.0)),
            ),
            feature(
                4,
                [text("Smith"), FieldValue::Missing, FieldValue::Missing, FieldValue::Missing],
                None,
            ),
            feature(
                5,
                [text("Jones"), FieldValue::Number(7.0), FieldValue::Missing, at(11)],
                Some(("X", "Chum", 12.0)),
            ),
        ])
    }

    #[test]
    fn frequencies_sum_to_feature_count() {
        let joined = survey();
        let rows = summarize(&joined, &SummaryFields::default()).unwrap();
        let total: u64 = rows.iter().map(|r| r.frequency).sum();
        assert_eq!(total, joined.features.len() as u64);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn failed_joins_form_their_own_group_first() {
        let rows = summarize(&survey(), &SummaryFields::default()).unwrap();

        let unmatched = &rows[0];
        assert_eq!(unmatched.stock, None);
        assert_eq!(unmatched.sect_code, None);
        assert_eq!(unmatched.sampler_name.as_deref(), Some("Smith"));
        assert_eq!(unmatched.frequency, 1);
        assert!(unmatched.sum_count.abs() < f64::EPSILON);
        assert_eq!(unmatched.mean_overall_rating, None);
        assert_eq!(unmatched.first_device_time, None);
    }

    #[test]
    fn reduces_matched_groups() {
        let rows = summarize(&survey(), &SummaryFields::default()).unwrap();

        let jones = &rows[1];
        assert_eq!(jones.sampler_name.as_deref(), Some("Jones"));
        assert_eq!(jones.mean_overall_rating, None);

        let smith = &rows[2];
        assert_eq!(smith.stock.as_deref(), Some("X"));
        assert_eq!(smith.species.as_deref(), Some("Chum"));
        assert_eq!(smith.sect_code.as_deref(), Some("12"));
        assert_eq!(smith.frequency, 2);
        assert!((smith.sum_count - 15.0).abs() < f64::EPSILON);
        assert!((smith.mean_overall_rating.unwrap() - 3.0).abs() < f64::EPSILON);
        assert_eq!(smith.first_device_time, at(8).as_timestamp());
    }

    #[test]
    fn non_numeric_counts_are_treated_as_missing() {
        let joined = layer(vec![feature(
            2,
            [text("Smith"), text("lots"), FieldValue::Number(5.0), at(9)],
            Some(("X", "Chum", 12.0)),
        )]);
        let rows = summarize(&joined, &SummaryFields::default()).unwrap();
        assert!(rows[0].sum_count.abs() < f64::EPSILON);
        assert_eq!(rows[0].frequency, 1);
    }

    #[test]
    fn rejects_unknown_fields() {
        let fields = SummaryFields {
            rating: "OverallRating".to_string(),
            ..SummaryFields::default()
        };
        let err = summarize(&survey(), &fields).unwrap_err();
        assert!(err.to_string().contains("OverallRating"));
    }

    #[test]
    fn absent_boundary_attributes_leave_keys_missing() {
        let mut joined = layer(vec![
            feature(2, [text("Smith"), FieldValue::Number(3.0), FieldValue::Missing, at(9)], None),
            feature(3, [text("Smith"), FieldValue::Number(4.0), FieldValue::Missing, at(8)], None),
        ]);
        joined.polygon_fields.clear();
        for f in &mut joined.features {
            f.polygon_values.clear();
        }

        let rows = summarize(&joined, &SummaryFields::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock, None);
        assert_eq!(rows[0].species, None);
        assert_eq!(rows[0].sect_code, None);
        assert_eq!(rows[0].frequency, 2);
        assert!((rows[0].sum_count - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn survey_columns_do_not_supply_boundary_keys() {
        let mut joined = survey();
        joined.point_fields.push("Species".to_string());
        joined.polygon_fields[1] = "Species_1".to_string();
        for f in &mut joined.features {
            f.point.values.push(text("Sockeye"));
        }

        let rows = summarize(&joined, &SummaryFields::default()).unwrap();
        assert_eq!(rows[0].stock, None);
        assert_eq!(rows[0].species, None);
        assert_eq!(rows[2].species.as_deref(), Some("Chum"));
    }

    #[test]
    fn fields_deserialize_with_defaults() {
        let fields: SummaryFields = toml::from_str(r#"count = "Total""#).unwrap();
        assert_eq!(fields.count, "Total");
        assert_eq!(fields.stock, "STOCK");
    }
}
