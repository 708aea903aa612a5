//! Polygon helpers shared by the catalog filter and the region reducers

use crate::types::{BoundingBox, LstError, LstResult};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Contains, Coord, Line, LineString, Point, Polygon};

/// Check that a ring is usable as an area of interest: finite coordinates,
/// at least three distinct vertices, non-zero area, no self-intersections.
pub fn validate_ring(ring: &LineString<f64>) -> LstResult<()> {
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    coords.dedup();

    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(LstError::InvalidGeometry(
            "Ring contains non-finite coordinates".to_string(),
        ));
    }

    if coords.first() != coords.last() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }

    // closed ring: first vertex repeated at the end
    if coords.len() < 4 {
        return Err(LstError::InvalidGeometry(format!(
            "Ring needs at least 3 distinct vertices, got {}",
            coords.len().saturating_sub(1)
        )));
    }

    let polygon = Polygon::new(LineString::from(coords.clone()), vec![]);
    if polygon.unsigned_area() <= 0.0 {
        return Err(LstError::InvalidGeometry("Ring has zero area".to_string()));
    }

    let segments: Vec<Line<f64>> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { is_proper, .. }) => {
                    if !adjacent || is_proper {
                        return Err(LstError::InvalidGeometry(format!(
                            "Ring self-intersects between segments {} and {}",
                            i, j
                        )));
                    }
                }
                Some(LineIntersection::Collinear { .. }) => {
                    return Err(LstError::InvalidGeometry(format!(
                        "Ring has overlapping segments {} and {}",
                        i, j
                    )));
                }
            }
        }
    }

    Ok(())
}

pub fn ring_bounds(ring: &LineString<f64>) -> BoundingBox {
    ring.0.iter().fold(
        BoundingBox {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        },
        |b, c| BoundingBox {
            min_x: b.min_x.min(c.x),
            max_x: b.max_x.max(c.x),
            min_y: b.min_y.min(c.y),
            max_y: b.max_y.max(c.y),
        },
    )
}

/// True when `footprint` fully contains `aoi` (touching the inside of the boundary is allowed)
pub fn footprint_contains(footprint: &Polygon<f64>, aoi: &Polygon<f64>) -> bool {
    footprint.contains(aoi)
}

pub fn contains_point(polygon: &Polygon<f64>, x: f64, y: f64) -> bool {
    polygon.contains(&Point::new(x, y))
}
