//! Point construction.
//!
//! Converts normalized survey records into [`PointFeature`]s in EPSG:4326
//! and truncates the schema to the legacy field-name limit.

use escapement_map_survey_models::{
    FieldValue, LATITUDE_FIELD, LONGITUDE_FIELD, PointFeature, PointLayer, RecordSet,
    SurveyRecord, truncate_field_names,
};

use crate::SurveyError;

/// Builds a [`PointLayer`] from normalized records.
///
/// Every record becomes exactly one point; nothing is silently dropped.
///
/// # Errors
///
/// Returns [`SurveyError::MalformedCoordinate`] for the first record whose
/// longitude or latitude is missing or not a finite number,
/// [`SurveyError::MalformedInput`] if a coordinate column is absent, and
/// [`SurveyError::FieldNameCollision`] if two field names truncate to the
/// same name.
pub fn build_points(records: RecordSet) -> Result<PointLayer, SurveyError> {
    let lon_idx = coordinate_index(&records, LONGITUDE_FIELD)?;
    let lat_idx = coordinate_index(&records, LATITUDE_FIELD)?;

    let mut features = Vec::with_capacity(records.records.len());

    for record in records.records {
        let longitude = coordinate(&record, lon_idx, LONGITUDE_FIELD)?;
        let latitude = coordinate(&record, lat_idx, LATITUDE_FIELD)?;
        features.push(PointFeature::new(record, longitude, latitude));
    }

    let fields = truncate_field_names(&records.fields)?;

    log::info!("Built {} survey points", features.len());

    Ok(PointLayer { fields, features })
}

fn coordinate_index(records: &RecordSet, field: &'static str) -> Result<usize, SurveyError> {
    records
        .fields
        .iter()
        .position(|f| f == field)
        .ok_or_else(|| SurveyError::MalformedInput {
            message: format!("coordinate field '{field}' is missing"),
        })
}

fn coordinate(
    record: &SurveyRecord,
    index: usize,
    field: &'static str,
) -> Result<f64, SurveyError> {
    let value = record.values.get(index).unwrap_or(&FieldValue::Missing);

    match value {
        FieldValue::Number(n) if n.is_finite() => Ok(*n),
        other => Err(SurveyError::MalformedCoordinate {
            record: record.identifier(),
            field,
            value: describe(other),
        }),
    }
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Missing => "missing".to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Timestamp(t) => format!("{t:?}"),
        FieldValue::Text(s) => format!("{s:?}"),
    }
}
