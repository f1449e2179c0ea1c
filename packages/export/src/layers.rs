//! `GeoJSON` export of point and joined layers.
//!
//! Geometries are EPSG:4326 points, so no `crs` member is written.
//! Property names are the layer's short field names; missing values
//! become `null`.

use std::path::Path;

use escapement_map_survey_models::{
    FieldValue, JOIN_COUNT_FIELD, JoinedLayer, PointFeature, PointLayer,
};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};

use crate::ExportError;

fn point_geometry(point: &PointFeature) -> Geometry {
    let location = point.geometry();
    Geometry::new(Value::Point(vec![location.x(), location.y()]))
}

fn insert_values(
    properties: &mut JsonObject,
    fields: &[String],
    values: &[FieldValue],
) -> Result<(), ExportError> {
    for (field, value) in fields.iter().zip(values) {
        properties.insert(field.clone(), serde_json::to_value(value)?);
    }
    Ok(())
}

fn feature(geometry: Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Converts the point layer into a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if a value cannot be serialized.
pub fn points_to_geojson(layer: &PointLayer) -> Result<FeatureCollection, ExportError> {
    let features = layer
        .features
        .iter()
        .map(|point| {
            let mut properties = JsonObject::new();
            insert_values(&mut properties, &layer.fields, &point.values)?;
            Ok(feature(point_geometry(point), properties))
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Converts the joined layer into a `FeatureCollection`.
///
/// Each feature carries its point attributes, the inherited polygon
/// attributes, and `Join_Count` as an integer.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if a value cannot be serialized.
pub fn joined_to_geojson(layer: &JoinedLayer) -> Result<FeatureCollection, ExportError> {
    let features = layer
        .features
        .iter()
        .map(|joined| {
            let mut properties = JsonObject::new();
            insert_values(&mut properties, &layer.point_fields, &joined.point.values)?;
            insert_values(&mut properties, &layer.polygon_fields, &joined.polygon_values)?;
            properties.insert(
                JOIN_COUNT_FIELD.to_string(),
                serde_json::Value::from(joined.join_count),
            );
            Ok(feature(point_geometry(&joined.point), properties))
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes a `FeatureCollection` to `path`.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the file cannot be written.
pub fn write_geojson(path: &Path, collection: FeatureCollection) -> Result<(), ExportError> {
    let count = collection.features.len();
    let text = GeoJson::FeatureCollection(collection).to_string();
    std::fs::write(path, text)?;
    log::info!("Wrote {count} features to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use escapement_map_survey_models::{JoinedFeature, SurveyRecord};

    use super::*;

    fn point(values: Vec<FieldValue>) -> PointFeature {
        PointFeature::new(
            SurveyRecord {
                source_line: 2,
                label: None,
                values,
            },
            -123.5,
            49.25,
        )
    }

    #[test]
    fn exports_points_with_null_for_missing() {
        let layer = PointLayer {
            fields: vec!["SamplerNam".to_string(), "Quality".to_string()],
            features: vec![point(vec![
                FieldValue::Text("Smith".to_string()),
                FieldValue::Missing,
            ])],
        };
        let collection = points_to_geojson(&layer).unwrap();
        let feature = &collection.features[0];

        assert_eq!(
            feature.geometry.as_ref().unwrap().value,
            Value::Point(vec![-123.5, 49.25])
        );
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["SamplerNam"], serde_json::json!("Smith"));
        assert_eq!(properties["Quality"], serde_json::Value::Null);
    }

    #[test]
    fn exports_join_count_as_integer() {
        let layer = JoinedLayer {
            point_fields: vec!["SamplerNam".to_string()],
            polygon_fields: vec!["STOCK".to_string()],
            features: vec![JoinedFeature {
                point: point(vec![FieldValue::Text("Smith".to_string())]),
                polygon_values: vec![FieldValue::Missing],
                polygon_ordinal: None,
                join_count: 0,
            }],
        };
        let collection = joined_to_geojson(&layer).unwrap();
        let properties = collection.features[0].properties.as_ref().unwrap();

        assert_eq!(properties["STOCK"], serde_json::Value::Null);
        assert_eq!(properties[JOIN_COUNT_FIELD], serde_json::json!(0));
        assert_eq!(properties.len(), 3);
    }
}
