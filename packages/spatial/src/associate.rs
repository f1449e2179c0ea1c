//! Point-to-boundary association (left-outer spatial join).

use std::collections::BTreeSet;
use std::sync::Arc;

use escapement_map_survey_models::{
    BoundaryLayer, FieldValue, JOIN_COUNT_FIELD, JoinedFeature, JoinedLayer, PointLayer,
    renamed_field_name, truncate_field_name,
};

use crate::{SpatialError, SpatialIndex, progress::ProgressCallback};

/// Attaches the attributes of the first intersecting boundary polygon to
/// every point.
///
/// Every input point yields exactly one [`JoinedFeature`], in input order.
/// Points that intersect no polygon get all-missing polygon attributes and
/// `Join_Count = 0`; each one is logged as a warning.
///
/// # Errors
///
/// Returns [`SpatialError::ReferenceSystemMismatch`] if `boundaries` has
/// not been prepared into the point reference system, or
/// [`SpatialError::FieldNameCollision`] if a survey field or boundary
/// attribute cannot be given a unique short name.
pub fn associate(
    points: PointLayer,
    boundaries: &BoundaryLayer,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<JoinedLayer, SpatialError> {
    if boundaries.reference_system != PointLayer::REFERENCE_SYSTEM {
        return Err(SpatialError::ReferenceSystemMismatch {
            points: PointLayer::REFERENCE_SYSTEM,
            boundaries: boundaries.reference_system,
        });
    }

    let point_fields = joined_point_fields(&points.fields)?;
    let polygon_fields = joined_polygon_fields(&point_fields, &boundaries.fields)?;
    let index = SpatialIndex::build(boundaries);

    progress.set_total(points.features.len() as u64);
    progress.set_message("Associating survey points".to_string());

    let mut unmatched = 0_usize;
    let mut features = Vec::with_capacity(points.features.len());

    for point in points.features {
        let feature = match index.lookup(point.geometry()) {
            Some(position) => {
                let polygon = &boundaries.polygons[position];
                log::debug!("{} -> {}", point.identifier(), polygon.identifier());
                JoinedFeature {
                    polygon_values: (0..boundaries.fields.len())
                        .map(|i| polygon.values.get(i).cloned().unwrap_or(FieldValue::Missing))
                        .collect(),
                    polygon_ordinal: Some(polygon.ordinal),
                    join_count: 1,
                    point,
                }
            }
            None => {
                let location = point.geometry();
                log::warn!(
                    "{} at ({}, {}) is outside every boundary polygon",
                    point.identifier(),
                    location.x(),
                    location.y()
                );
                unmatched += 1;
                JoinedFeature {
                    polygon_values: vec![FieldValue::Missing; boundaries.fields.len()],
                    polygon_ordinal: None,
                    join_count: 0,
                    point,
                }
            }
        };

        features.push(feature);
        progress.inc(1);
    }

    progress.finish(format!(
        "Associated {} points ({unmatched} unmatched)",
        features.len()
    ));
    log::info!(
        "Associated {} points with {} polygons, {unmatched} unmatched",
        features.len(),
        index.size()
    );

    Ok(JoinedLayer {
        point_fields,
        polygon_fields,
        features,
    })
}

/// Carries point field names over, moving a survey column that uses the
/// reserved `Join_Count` name out of the way.
fn joined_point_fields(point_fields: &[String]) -> Result<Vec<String>, SpatialError> {
    if !point_fields.iter().any(|f| f == JOIN_COUNT_FIELD) {
        return Ok(point_fields.to_vec());
    }

    let renamed = renamed_field_name(JOIN_COUNT_FIELD);
    if point_fields.contains(&renamed) {
        return Err(SpatialError::FieldNameCollision {
            field: JOIN_COUNT_FIELD.to_string(),
            name: renamed,
        });
    }
    log::warn!("Survey field {JOIN_COUNT_FIELD} is reserved, renaming it to {renamed}");

    Ok(point_fields
        .iter()
        .map(|f| if f == JOIN_COUNT_FIELD { renamed.clone() } else { f.clone() })
        .collect())
}

/// Computes short names for inherited boundary attributes.
///
/// Names are truncated like point fields. A name already used by a point
/// field, an earlier attribute, or `Join_Count` is renamed with
/// [`renamed_field_name`].
fn joined_polygon_fields(
    point_fields: &[String],
    polygon_fields: &[String],
) -> Result<Vec<String>, SpatialError> {
    let mut taken: BTreeSet<String> = point_fields.iter().cloned().collect();
    taken.insert(JOIN_COUNT_FIELD.to_string());

    polygon_fields
        .iter()
        .map(|field| {
            let mut name = truncate_field_name(field);
            if taken.contains(&name) {
                let renamed = renamed_field_name(field);
                log::debug!("Renaming boundary attribute {field} to {renamed}");
                name = renamed;
            }

            if !taken.insert(name.clone()) {
                return Err(SpatialError::FieldNameCollision {
                    field: field.clone(),
                    name,
                });
            }
            Ok(name)
        })
        .collect()
}
