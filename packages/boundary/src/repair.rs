//! Polygon validity repair.
//!
//! Consecutive duplicate vertices are always removed. Geometry that is
//! still invalid afterwards (typically a self-intersecting ring) is
//! rebuilt with a boolean union, which splits bow-ties into their simple
//! parts. Valid input comes back unchanged.

use geo::{
    Area, BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect, Validation,
};

use crate::BoundaryError;

/// Minimum number of coordinates in a closed ring.
const MIN_RING_COORDS: usize = 4;

/// Relative slack allowed when comparing repaired and original extents.
const EXTENT_TOLERANCE: f64 = 1e-9;

/// Repairs a boundary geometry into a valid (multi)polygon.
///
/// `identifier` names the polygon in error messages.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidGeometry`] if an exterior ring has too
/// few distinct vertices, if repair yields an empty or zero-area result,
/// or if the repaired geometry is still invalid or extends beyond the
/// original's bounding box.
pub fn repair_geometry(
    geometry: &MultiPolygon<f64>,
    identifier: &str,
) -> Result<MultiPolygon<f64>, BoundaryError> {
    let invalid = |reason: &str| BoundaryError::InvalidGeometry {
        polygon: identifier.to_string(),
        reason: reason.to_string(),
    };

    if geometry.0.is_empty() {
        return Err(invalid("geometry has no polygons"));
    }

    let non_finite = geometry
        .0
        .iter()
        .flat_map(rings)
        .flat_map(|ring| &ring.0)
        .any(|c| !c.x.is_finite() || !c.y.is_finite());
    if non_finite {
        return Err(invalid("geometry has non-finite coordinates"));
    }

    let deduped = MultiPolygon(
        geometry
            .0
            .iter()
            .map(|p| dedup_polygon(p, identifier))
            .collect::<Result<Vec<_>, _>>()?,
    );

    if deduped.is_valid() {
        if deduped.unsigned_area() <= 0.0 {
            return Err(invalid("polygon has zero area"));
        }
        if deduped != *geometry {
            log::debug!("{identifier}: removed duplicate vertices");
        }
        return Ok(deduped);
    }

    log::warn!("{identifier}: invalid geometry, rebuilding with a union");

    let repaired = deduped.union(&MultiPolygon::<f64>::new(Vec::new()));

    if repaired.0.is_empty() || repaired.unsigned_area() <= 0.0 {
        return Err(invalid("repair produced an empty or zero-area polygon"));
    }

    if !repaired.is_valid() {
        return Err(invalid("repair did not produce a valid polygon"));
    }

    if let (Some(before), Some(after)) = (geometry.bounding_rect(), repaired.bounding_rect())
        && !within_extent(after, before)
    {
        return Err(invalid("repair changed the polygon extent"));
    }

    Ok(repaired)
}

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors())
}

/// Removes consecutive duplicate vertices from every ring. Degenerate holes
/// are dropped; a degenerate exterior is an error.
fn dedup_polygon(polygon: &Polygon<f64>, identifier: &str) -> Result<Polygon<f64>, BoundaryError> {
    let exterior = dedup_ring(polygon.exterior());
    if exterior.0.len() < MIN_RING_COORDS {
        return Err(BoundaryError::InvalidGeometry {
            polygon: identifier.to_string(),
            reason: format!(
                "exterior ring has {} distinct vertices",
                exterior.0.len().saturating_sub(1)
            ),
        });
    }

    let interiors = polygon
        .interiors()
        .iter()
        .map(dedup_ring)
        .filter(|ring| {
            let keep = ring.0.len() >= MIN_RING_COORDS;
            if !keep {
                log::warn!("{identifier}: dropping degenerate interior ring");
            }
            keep
        })
        .collect();

    Ok(Polygon::new(exterior, interiors))
}

fn dedup_ring(ring: &LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    coords.dedup();
    let mut ring = LineString(coords);
    ring.close();
    ring
}

fn within_extent(inner: Rect<f64>, outer: Rect<f64>) -> bool {
    let slack = EXTENT_TOLERANCE * outer.width().max(outer.height()).max(1.0);
    inner.min().x >= outer.min().x - slack
        && inner.min().y >= outer.min().y - slack
        && inner.max().x <= outer.max().x + slack
        && inner.max().y <= outer.max().y + slack
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Point, polygon};

    use super::*;

    fn square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)]
    }

    #[test]
    fn valid_polygon_round_trips_unchanged() {
        let mp = MultiPolygon(vec![square()]);
        let repaired = repair_geometry(&mp, "square").unwrap();
        assert_eq!(repaired, mp);
    }

    #[test]
    fn removes_duplicate_vertices_without_changing_rings() {
        let with_dupes = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 0.0),
                (4.0, 4.0),
                (0.0, 4.0),
                (0.0, 4.0),
                (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (2.0, 1.0),
                (2.0, 1.0),
                (2.0, 2.0),
                (1.0, 1.0),
            ])],
        );
        let repaired = repair_geometry(&MultiPolygon(vec![with_dupes]), "dupes").unwrap();

        assert_eq!(repaired.0.len(), 1);
        assert_eq!(repaired.0[0].exterior().0.len(), 5);
        assert_eq!(repaired.0[0].interiors().len(), 1);
        assert_eq!(repaired.0[0].interiors()[0].0.len(), 4);
        assert!(repaired.is_valid());
    }

    #[test]
    fn repairs_self_intersecting_bow_tie() {
        let bow_tie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        );
        let original = MultiPolygon(vec![bow_tie]);
        assert!(!original.is_valid());

        let repaired = repair_geometry(&original, "bow-tie").unwrap();
        assert!(repaired.is_valid());
        assert!((repaired.unsigned_area() - 2.0).abs() < 1e-9);

        let rect = repaired.bounding_rect().unwrap();
        assert!(within_extent(rect, original.bounding_rect().unwrap()));
        assert!(repaired.contains(&Point::new(0.2, 1.0)));
        assert!(repaired.contains(&Point::new(1.8, 1.0)));
    }

    #[test]
    fn rejects_degenerate_polygon() {
        let spike = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        );
        let err = repair_geometry(&MultiPolygon(vec![spike]), "spike").unwrap_err();
        assert!(matches!(err, BoundaryError::InvalidGeometry { .. }));
        assert!(err.to_string().contains("spike"));
    }

    #[test]
    fn rejects_collinear_zero_area_polygon() {
        let flat = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        let err = repair_geometry(&MultiPolygon(vec![flat]), "flat").unwrap_err();
        assert!(matches!(err, BoundaryError::InvalidGeometry { .. }));
    }

    #[test]
    fn rejects_empty_geometry() {
        let err = repair_geometry(&MultiPolygon::new(Vec::new()), "empty").unwrap_err();
        assert!(matches!(err, BoundaryError::InvalidGeometry { .. }));
    }
}
