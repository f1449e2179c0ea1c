#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for stream-section attribution.
//!
//! Builds an R-tree over prepared boundary polygons and attaches the
//! attributes of the first intersecting polygon to every survey point.

pub mod associate;
pub mod progress;

use escapement_map_survey_models::{BoundaryLayer, ReferenceSystem};
use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use associate::associate;
pub use progress::{NullProgress, ProgressCallback, null_progress};

/// Errors that can occur during spatial association.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Points and polygons are not in the same reference system.
    #[error("Boundaries are in {boundaries} but points are in {points}")]
    ReferenceSystemMismatch {
        /// Reference system of the point layer.
        points: ReferenceSystem,
        /// Reference system of the boundary layer.
        boundaries: ReferenceSystem,
    },

    /// An inherited polygon attribute cannot be given a unique short name.
    #[error("Boundary attribute '{field}' collides with existing field '{name}'")]
    FieldNameCollision {
        /// Attribute name in the boundary layer.
        field: String,
        /// Short name that was already taken.
        name: String,
    },
}

/// A boundary polygon stored in the R-tree with its collection position.
struct BoundaryEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over the polygons of one [`BoundaryLayer`].
pub struct SpatialIndex {
    tree: RTree<BoundaryEntry>,
}

impl SpatialIndex {
    /// Bulk-loads an index over every polygon in `layer`.
    #[must_use]
    pub fn build(layer: &BoundaryLayer) -> Self {
        let entries = layer
            .polygons
            .iter()
            .enumerate()
            .filter_map(|(position, polygon)| {
                let Some(envelope) = compute_envelope(&polygon.geometry) else {
                    log::warn!("{} has no extent, skipping", polygon.identifier());
                    return None;
                };
                Some(BoundaryEntry {
                    position,
                    envelope,
                    polygon: polygon.geometry.clone(),
                })
            })
            .collect();

        let tree = RTree::bulk_load(entries);
        log::debug!("Indexed {} boundary polygons", tree.size());

        Self { tree }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// Returns the collection position of the first polygon intersecting
    /// `point`.
    ///
    /// Boundaries may overlap. The R-tree yields candidates in no
    /// particular order, so the lowest position wins regardless of which
    /// candidate is visited first. Points on a polygon edge intersect it.
    #[must_use]
    pub fn lookup(&self, point: Point<f64>) -> Option<usize> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .map(|entry| entry.position)
            .min()
    }
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}

#[cfg(test)]
mod tests {
    use escapement_map_survey_models::{BoundaryPolygon, FieldValue};
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn square(ordinal: usize, x0: f64, y0: f64, size: f64) -> BoundaryPolygon {
        BoundaryPolygon {
            ordinal,
            id: None,
            values: vec![FieldValue::Text(format!("S{ordinal}"))],
            geometry: MultiPolygon(vec![polygon![
                (x: x0, y: y0),
                (x: x0 + size, y: y0),
                (x: x0 + size, y: y0 + size),
                (x: x0, y: y0 + size),
            ]]),
        }
    }

    fn layer(polygons: Vec<BoundaryPolygon>) -> BoundaryLayer {
        BoundaryLayer {
            fields: vec!["STOCK".to_string()],
            reference_system: ReferenceSystem::Wgs84,
            polygons,
        }
    }

    #[test]
    fn finds_enclosing_polygon() {
        let index = SpatialIndex::build(&layer(vec![
            square(0, 0.0, 0.0, 1.0),
            square(1, 2.0, 0.0, 1.0),
        ]));
        assert_eq!(index.size(), 2);
        assert_eq!(index.lookup(Point::new(2.5, 0.5)), Some(1));
        assert_eq!(index.lookup(Point::new(1.5, 0.5)), None);
    }

    #[test]
    fn overlapping_polygons_resolve_to_first_in_collection() {
        // Many overlapping candidates so the tree visits them in its own
        // order rather than insertion order.
        let polygons = (0..50_u32)
            .map(|i| square(usize::try_from(i).unwrap(), 0.0, 0.0, 10.0 + f64::from(i)))
            .collect();
        let index = SpatialIndex::build(&layer(polygons));
        assert_eq!(index.lookup(Point::new(5.0, 5.0)), Some(0));
        assert_eq!(index.lookup(Point::new(30.5, 30.5)), Some(21));
    }

    #[test]
    fn edge_points_intersect() {
        let index = SpatialIndex::build(&layer(vec![square(0, 0.0, 0.0, 1.0)]));
        assert_eq!(index.lookup(Point::new(1.0, 0.5)), Some(0));
        assert_eq!(index.lookup(Point::new(0.0, 0.0)), Some(0));
    }
}
