//! Boundary polygon loading from `GeoJSON`.
//!
//! Reads a `FeatureCollection` of stream-section polygons. The reference
//! system comes from an explicit override, else from the legacy `crs`
//! member (`{"type": "name", "properties": {"name": "EPSG:3005"}}`), else
//! defaults to EPSG:4326 as RFC 7946 requires.

use std::path::Path;

use escapement_map_survey_models::{BoundaryLayer, BoundaryPolygon, FieldValue, ReferenceSystem};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson, JsonObject, feature::Id};

use crate::BoundaryError;

/// Parses a `GeoJSON` `FeatureCollection` into a [`BoundaryLayer`].
///
/// # Errors
///
/// Returns [`BoundaryError::GeoJson`] if the text is not valid `GeoJSON`,
/// [`BoundaryError::Format`] if it is not a `FeatureCollection`,
/// [`BoundaryError::UnknownReferenceSystem`] if the declared `crs` is not
/// supported, and [`BoundaryError::InvalidGeometry`] if a feature has no
/// polygon geometry.
pub fn parse_boundaries(
    geojson_str: &str,
    crs_override: Option<ReferenceSystem>,
) -> Result<BoundaryLayer, BoundaryError> {
    let geojson: GeoJson = geojson_str.parse()?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(BoundaryError::Format {
            message: "boundary file must contain a FeatureCollection".to_string(),
        });
    };

    let reference_system = match crs_override {
        Some(rs) => rs,
        None => declared_reference_system(collection.foreign_members.as_ref())?,
    };

    let fields = attribute_fields(&collection.features);

    let polygons = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(ordinal, feature)| boundary_polygon(ordinal, feature, &fields))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Loaded {} boundary polygons ({} attributes) in {reference_system}",
        polygons.len(),
        fields.len()
    );

    Ok(BoundaryLayer {
        fields,
        reference_system,
        polygons,
    })
}

/// Reads `path` and parses it with [`parse_boundaries`].
///
/// # Errors
///
/// Returns [`BoundaryError::Io`] if the file cannot be read, plus every
/// error [`parse_boundaries`] can return.
pub fn load_boundaries(
    path: &Path,
    crs_override: Option<ReferenceSystem>,
) -> Result<BoundaryLayer, BoundaryError> {
    log::info!("Reading boundary polygons from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    parse_boundaries(&text, crs_override)
}

/// Resolves the legacy `crs` member of a `FeatureCollection`.
fn declared_reference_system(
    foreign_members: Option<&JsonObject>,
) -> Result<ReferenceSystem, BoundaryError> {
    let Some(crs) = foreign_members.and_then(|m| m.get("crs")) else {
        return Ok(ReferenceSystem::Wgs84);
    };

    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str);

    match name {
        Some(name) => {
            ReferenceSystem::parse(name).ok_or_else(|| BoundaryError::UnknownReferenceSystem {
                declared: name.to_string(),
            })
        }
        None => Err(BoundaryError::UnknownReferenceSystem {
            declared: crs.to_string(),
        }),
    }
}

/// Collects attribute names in first-seen order across all features.
fn attribute_fields(features: &[Feature]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();

    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for key in properties.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
    }

    fields
}

fn boundary_polygon(
    ordinal: usize,
    feature: Feature,
    fields: &[String],
) -> Result<BoundaryPolygon, BoundaryError> {
    let id = feature.id.as_ref().map(|id| match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    });

    let identifier = id.as_ref().map_or_else(
        || format!("polygon #{ordinal}"),
        |id| format!("polygon #{ordinal} ({id})"),
    );

    let values = fields
        .iter()
        .map(|field| {
            feature
                .properties
                .as_ref()
                .and_then(|p| p.get(field))
                .map_or(FieldValue::Missing, json_to_field_value)
        })
        .collect();

    let Some(geometry) = feature.geometry else {
        return Err(BoundaryError::InvalidGeometry {
            polygon: identifier,
            reason: "feature has no geometry".to_string(),
        });
    };

    let geometry: geo::Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| BoundaryError::InvalidGeometry {
                polygon: identifier.clone(),
                reason: e.to_string(),
            })?;

    let geometry = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => {
            return Err(BoundaryError::InvalidGeometry {
                polygon: identifier,
                reason: "geometry is not a Polygon or MultiPolygon".to_string(),
            });
        }
    };

    Ok(BoundaryPolygon {
        ordinal,
        id,
        values,
        geometry,
    })
}

/// Converts a `GeoJSON` property value into a [`FieldValue`].
fn json_to_field_value(value: &serde_json::Value) -> FieldValue {
    match value {
        serde_json::Value::Null => FieldValue::Missing,
        serde_json::Value::Number(n) => n.as_f64().map_or(FieldValue::Missing, FieldValue::Number),
        serde_json::Value::String(s) if s.trim().is_empty() => FieldValue::Missing,
        serde_json::Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "A",
                "properties": {"STOCK": "X", "Species": "Chum", "Sect_Code": 12},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"STOCK": "Y", "Species": null, "Extra": true},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[2,0],[3,0],[3,1],[2,1],[2,0]]]]}
            }
        ]
    }"#;

    #[test]
    fn loads_polygons_and_attributes() {
        let layer = parse_boundaries(SQUARES, None).unwrap();
        assert_eq!(layer.reference_system, ReferenceSystem::Wgs84);
        assert_eq!(layer.polygons.len(), 2);
        assert_eq!(layer.polygons[0].id.as_deref(), Some("A"));
        assert_eq!(layer.polygons[1].ordinal, 1);

        let stock = layer.fields.iter().position(|f| f == "STOCK").unwrap();
        let species = layer.fields.iter().position(|f| f == "Species").unwrap();
        let sect = layer.fields.iter().position(|f| f == "Sect_Code").unwrap();
        let extra = layer.fields.iter().position(|f| f == "Extra").unwrap();

        assert_eq!(layer.polygons[0].values[stock], FieldValue::Text("X".to_string()));
        assert_eq!(layer.polygons[0].values[sect], FieldValue::Number(12.0));
        assert_eq!(layer.polygons[0].values[extra], FieldValue::Missing);
        assert_eq!(layer.polygons[1].values[species], FieldValue::Missing);
        assert_eq!(layer.polygons[1].values[extra], FieldValue::Text("true".to_string()));
    }

    #[test]
    fn reads_declared_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3005"}},
            "features": []
        }"#;
        let layer = parse_boundaries(text, None).unwrap();
        assert_eq!(layer.reference_system, ReferenceSystem::BcAlbers);
    }

    #[test]
    fn reads_alaska_albers_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:3338"}},
            "features": []
        }"#;
        let layer = parse_boundaries(text, None).unwrap();
        assert_eq!(layer.reference_system, ReferenceSystem::AlaskaAlbers);
    }

    #[test]
    fn override_wins_over_declared_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:9999"}},
            "features": []
        }"#;
        let layer = parse_boundaries(text, Some(ReferenceSystem::WebMercator)).unwrap();
        assert_eq!(layer.reference_system, ReferenceSystem::WebMercator);
    }

    #[test]
    fn rejects_unknown_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:9999"}},
            "features": []
        }"#;
        let err = parse_boundaries(text, None).unwrap_err();
        assert!(matches!(err, BoundaryError::UnknownReferenceSystem { .. }));
        assert!(err.to_string().contains("EPSG:9999"));
    }

    #[test]
    fn rejects_non_polygon_features() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]
        }"#;
        let err = parse_boundaries(text, None).unwrap_err();
        assert!(matches!(err, BoundaryError::InvalidGeometry { .. }));
        assert!(err.to_string().contains("polygon #0"));
    }

    #[test]
    fn rejects_bare_geometry() {
        let text = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        let err = parse_boundaries(text, None).unwrap_err();
        assert!(matches!(err, BoundaryError::Format { .. }));
    }
}
