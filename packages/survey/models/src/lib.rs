#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Escapement survey data model.
//!
//! Each pipeline stage produces a new layer from the previous one: a
//! [`RecordSet`] of normalized rows, a [`PointLayer`] of geolocated
//! observations, a [`BoundaryLayer`] of stream-section polygons, a
//! [`JoinedLayer`] carrying inherited polygon attributes, and finally the
//! grouped [`SummaryRow`]s. Layers keep their field names in one shared
//! schema vector and each feature stores its values positionally.

pub mod fields;
pub mod reference_system;

use chrono::NaiveDateTime;
use geo::{MultiPolygon, Point};
use serde::Serialize;

pub use fields::{
    FieldNameCollision, MAX_FIELD_NAME_LEN, RENAME_SUFFIX, field_position, renamed_field_name,
    truncate_field_name, truncate_field_names,
};
pub use reference_system::ReferenceSystem;

/// Name of the mandatory longitude column.
pub const LONGITUDE_FIELD: &str = "Longitude";

/// Name of the mandatory latitude column.
pub const LATITUDE_FIELD: &str = "Latitude";

/// Name of the join-success flag appended to every joined feature.
pub const JOIN_COUNT_FIELD: &str = "Join_Count";

/// A single scalar attribute value.
///
/// Serializes to the natural JSON type: `null` for [`Self::Missing`],
/// a number, a string, or an ISO 8601 timestamp string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Blank cell, `NA`, or an attribute inherited from no polygon.
    Missing,
    /// Finite numeric value.
    Number(f64),
    /// Date and time without a zone, as recorded by the survey device.
    Timestamp(NaiveDateTime),
    /// Any other text.
    Text(String),
}

impl FieldValue {
    /// Returns `true` for [`Self::Missing`].
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns the numeric value, or `None` for every other variant.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the timestamp value, or `None` for every other variant.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Renders the value as a grouping key. Missing values have no key.
    ///
    /// Integral numbers render without a fractional part so that a
    /// section code of `12` groups as `"12"`, not `"12.0"`.
    #[must_use]
    pub fn key_string(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Number(n) => Some(format_number(*n)),
            Self::Timestamp(t) => Some(t.format(TIMESTAMP_FORMAT).to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

/// Output format for timestamps in keys and exported tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a number, dropping the fractional part when it is zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// One normalized survey observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    /// 1-based line number in the source table (the header is line 1).
    pub source_line: usize,
    /// Content of the discarded positional index column, if any.
    pub label: Option<String>,
    /// Values aligned with [`RecordSet::fields`].
    pub values: Vec<FieldValue>,
}

impl SurveyRecord {
    /// Human-readable identifier used in error messages and reports.
    #[must_use]
    pub fn identifier(&self) -> String {
        match &self.label {
            Some(label) => format!("line {} (row {label})", self.source_line),
            None => format!("line {}", self.source_line),
        }
    }
}

/// Normalized survey table: unique field names plus positional records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    /// Unique, non-empty field names.
    pub fields: Vec<String>,
    /// Records in source order.
    pub records: Vec<SurveyRecord>,
}

impl RecordSet {
    /// Returns the column index for `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        field_position(&self.fields, name)
    }
}

/// A survey observation with its point geometry (EPSG:4326).
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Source line of the originating [`SurveyRecord`].
    pub source_line: usize,
    /// Index column label of the originating record.
    pub label: Option<String>,
    /// Values aligned with [`PointLayer::fields`].
    pub values: Vec<FieldValue>,
    geometry: Point<f64>,
}

impl PointFeature {
    /// Creates a point feature at (`longitude`, `latitude`).
    #[must_use]
    pub fn new(record: SurveyRecord, longitude: f64, latitude: f64) -> Self {
        Self {
            source_line: record.source_line,
            label: record.label,
            values: record.values,
            geometry: Point::new(longitude, latitude),
        }
    }

    /// The point geometry, x = longitude and y = latitude.
    #[must_use]
    pub const fn geometry(&self) -> Point<f64> {
        self.geometry
    }

    /// Human-readable identifier used in error messages and reports.
    #[must_use]
    pub fn identifier(&self) -> String {
        match &self.label {
            Some(label) => format!("line {} (row {label})", self.source_line),
            None => format!("line {}", self.source_line),
        }
    }
}

/// Geolocated survey observations sharing one truncated schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLayer {
    /// Field names, each at most [`MAX_FIELD_NAME_LEN`] characters.
    pub fields: Vec<String>,
    /// Features in source order.
    pub features: Vec<PointFeature>,
}

impl PointLayer {
    /// Reference system of every point geometry.
    pub const REFERENCE_SYSTEM: ReferenceSystem = ReferenceSystem::Wgs84;

    /// Returns the column index for `name`, accepting the untruncated name.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        field_position(&self.fields, name)
    }
}

/// A stream-section boundary with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    /// Position in the source collection. Association ties are broken by
    /// the lowest ordinal.
    pub ordinal: usize,
    /// Feature identifier from the source, if present.
    pub id: Option<String>,
    /// Values aligned with [`BoundaryLayer::fields`].
    pub values: Vec<FieldValue>,
    /// Polygon geometry in [`BoundaryLayer::reference_system`].
    pub geometry: MultiPolygon<f64>,
}

impl BoundaryPolygon {
    /// Human-readable identifier used in error messages.
    #[must_use]
    pub fn identifier(&self) -> String {
        match &self.id {
            Some(id) => format!("polygon #{} ({id})", self.ordinal),
            None => format!("polygon #{}", self.ordinal),
        }
    }
}

/// A collection of boundary polygons in a declared reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayer {
    /// Attribute names (e.g. `STOCK`, `Species`, `Sect_Code`).
    pub fields: Vec<String>,
    /// Reference system the polygon coordinates are expressed in.
    pub reference_system: ReferenceSystem,
    /// Polygons in source order.
    pub polygons: Vec<BoundaryPolygon>,
}

/// A point feature extended with the attributes of at most one polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFeature {
    /// The associated observation.
    pub point: PointFeature,
    /// Values aligned with [`JoinedLayer::polygon_fields`]. All
    /// [`FieldValue::Missing`] when `join_count` is 0.
    pub polygon_values: Vec<FieldValue>,
    /// Ordinal of the matched polygon.
    pub polygon_ordinal: Option<usize>,
    /// 1 when the point intersects a polygon, 0 otherwise.
    pub join_count: u8,
}

impl JoinedFeature {
    /// Returns `true` if the spatial join found no polygon.
    #[must_use]
    pub const fn is_unmatched(&self) -> bool {
        self.join_count == 0
    }
}

/// Output of the spatial association.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedLayer {
    /// Field names carried over from the [`PointLayer`].
    pub point_fields: Vec<String>,
    /// Inherited polygon attribute names, renamed where they collide with
    /// a point field.
    pub polygon_fields: Vec<String>,
    /// One feature per input point, in input order.
    pub features: Vec<JoinedFeature>,
}

impl JoinedLayer {
    /// All field names in output order, ending with `Join_Count`.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.point_fields
            .iter()
            .chain(&self.polygon_fields)
            .map(String::as_str)
            .chain(std::iter::once(JOIN_COUNT_FIELD))
            .collect()
    }

    /// Returns the value of `name` for `feature`.
    ///
    /// Point fields are searched first, then inherited polygon fields, then
    /// `Join_Count`. Untruncated names resolve to their truncated form.
    #[must_use]
    pub fn value<'a>(&self, feature: &'a JoinedFeature, name: &str) -> Option<FieldRef<'a>> {
        if let Some(i) = field_position(&self.point_fields, name) {
            return feature.point.values.get(i).map(FieldRef::Borrowed);
        }
        if let Some(i) = field_position(&self.polygon_fields, name) {
            return feature.polygon_values.get(i).map(FieldRef::Borrowed);
        }
        (name == JOIN_COUNT_FIELD)
            .then(|| FieldRef::Owned(FieldValue::Number(f64::from(feature.join_count))))
    }

    /// Returns the inherited polygon attribute `name` for `feature`.
    ///
    /// Point fields are not consulted. An attribute renamed because a point
    /// field shadowed it is found under its source name.
    #[must_use]
    pub fn polygon_value<'a>(
        &self,
        feature: &'a JoinedFeature,
        name: &str,
    ) -> Option<&'a FieldValue> {
        self.polygon_position(name)
            .and_then(|i| feature.polygon_values.get(i))
    }

    /// Returns `true` if the boundary polygons carry attribute `name`.
    #[must_use]
    pub fn has_polygon_field(&self, name: &str) -> bool {
        self.polygon_position(name).is_some()
    }

    fn polygon_position(&self, name: &str) -> Option<usize> {
        field_position(&self.polygon_fields, name)
            .or_else(|| field_position(&self.polygon_fields, &renamed_field_name(name)))
    }

    /// Returns `true` if `name` resolves to a field of this layer.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        name == JOIN_COUNT_FIELD
            || field_position(&self.point_fields, name).is_some()
            || field_position(&self.polygon_fields, name).is_some()
    }

    /// Features whose location matched no boundary polygon.
    pub fn unmatched(&self) -> impl Iterator<Item = &JoinedFeature> {
        self.features.iter().filter(|f| f.is_unmatched())
    }
}

/// A field value looked up from a [`JoinedLayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef<'a> {
    /// A value stored on the feature.
    Borrowed(&'a FieldValue),
    /// A value derived on lookup (`Join_Count`).
    Owned(FieldValue),
}

impl std::ops::Deref for FieldRef<'_> {
    type Target = FieldValue;

    fn deref(&self) -> &FieldValue {
        match self {
            Self::Borrowed(v) => v,
            Self::Owned(v) => v,
        }
    }
}

/// Column headers of the summary table, in output order.
pub const SUMMARY_COLUMNS: [&str; 8] = [
    "STOCK",
    "SPECIES",
    "SECT_CODE",
    "SAMPLERNAME",
    "FREQUENCY",
    "SUM_COUNT",
    "MEAN_OVERALL_RATING",
    "FIRST_DEVICE_TIME",
];

/// One aggregate per distinct (stock, species, section, observer) key.
///
/// Key components are `None` when the contributing features carried no
/// value, which is always the case for features that failed to join.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Stock inherited from the boundary polygon.
    pub stock: Option<String>,
    /// Species inherited from the boundary polygon.
    pub species: Option<String>,
    /// Stream section code inherited from the boundary polygon.
    pub sect_code: Option<String>,
    /// Observer who recorded the survey.
    pub sampler_name: Option<String>,
    /// Number of joined features in the group.
    pub frequency: u64,
    /// Sum of survey counts; missing counts contribute nothing.
    pub sum_count: f64,
    /// Mean quality rating over non-missing ratings.
    pub mean_overall_rating: Option<f64>,
    /// Earliest non-missing device timestamp.
    pub first_device_time: Option<NaiveDateTime>,
}
