#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stream-section boundary preparation.
//!
//! Loads boundary polygons from `GeoJSON`, reprojects them into the survey
//! point reference system when the declared system differs, and repairs
//! invalid geometry so every polygon is valid before spatial association.

pub mod load;
pub mod project;
pub mod repair;

use escapement_map_survey_models::{BoundaryLayer, ReferenceSystem};
use geo::CoordsIter;
use thiserror::Error;

pub use load::{load_boundaries, parse_boundaries};
pub use repair::repair_geometry;

/// Errors that can occur while loading and preparing boundary polygons.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// I/O error reading the boundary file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The boundary file has an unexpected structure.
    #[error("Boundary format error: {message}")]
    Format {
        /// Description of what went wrong.
        message: String,
    },

    /// The declared reference system is not supported.
    #[error("Unknown reference system: {declared}")]
    UnknownReferenceSystem {
        /// The identifier as declared in the source.
        declared: String,
    },

    /// Coordinates could not be transformed between reference systems.
    #[error("Cannot reproject {polygon} from {from} to {to}")]
    Reprojection {
        /// Offending polygon.
        polygon: String,
        /// Source reference system.
        from: ReferenceSystem,
        /// Target reference system.
        to: ReferenceSystem,
    },

    /// Geometry is missing or cannot be repaired into a valid polygon.
    #[error("Invalid geometry in {polygon}: {reason}")]
    InvalidGeometry {
        /// Offending polygon.
        polygon: String,
        /// Why the geometry was rejected.
        reason: String,
    },
}

/// Reprojects `layer` into `target` if needed and repairs every polygon.
///
/// Polygon order, ordinals, and attributes are preserved.
///
/// # Errors
///
/// Returns [`BoundaryError::Reprojection`] if a vertex does not transform
/// to finite coordinates, or [`BoundaryError::InvalidGeometry`] if a
/// polygon cannot be repaired.
pub fn prepare_boundaries(
    layer: BoundaryLayer,
    target: ReferenceSystem,
) -> Result<BoundaryLayer, BoundaryError> {
    let from = layer.reference_system;

    if from == target {
        log::debug!("Boundaries already in {target}");
    } else {
        log::info!(
            "Reprojecting {} boundary polygons from {from} to {target}",
            layer.polygons.len()
        );
    }

    let polygons = layer
        .polygons
        .into_iter()
        .map(|mut polygon| {
            let identifier = polygon.identifier();
            let projected = project::reproject(&polygon.geometry, from, target);

            if projected
                .coords_iter()
                .any(|c| !c.x.is_finite() || !c.y.is_finite())
            {
                return Err(BoundaryError::Reprojection {
                    polygon: identifier,
                    from,
                    to: target,
                });
            }

            polygon.geometry = repair_geometry(&projected, &identifier)?;
            Ok(polygon)
        })
        .collect::<Result<Vec<_>, BoundaryError>>()?;

    log::info!("Prepared {} boundary polygons", polygons.len());

    Ok(BoundaryLayer {
        fields: layer.fields,
        reference_system: target,
        polygons,
    })
}
