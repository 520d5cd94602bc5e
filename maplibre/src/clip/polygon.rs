use std::panic::{self, AssertUnwindSafe};

use geo::BooleanOps;
use geo_types::{Coord, LineString, Polygon, Rect};

use crate::{
    tile::Part,
    util::math::{contains_rect, intersects, rect_from_points},
};

/// Coordinates are snapped to a grid of 1/1000 pixel before intersecting, which keeps the sweep
/// free of near-coincident vertices.
const CLIP_PRECISION: f64 = 1000.0;

/// A clip rectangle together with its polygon form.
#[derive(Debug, Clone)]
pub struct ClipBounds {
    rect: Rect<f32>,
    polygon: Polygon<f64>,
}

impl ClipBounds {
    pub fn new(rect: Rect<f32>) -> Self {
        let polygon = Rect::new(snap(rect.min()), snap(rect.max())).to_polygon();
        Self { rect, polygon }
    }

    pub fn rect(&self) -> &Rect<f32> {
        &self.rect
    }
}

fn snap(coord: Coord<f32>) -> Coord<f64> {
    Coord {
        x: (coord.x as f64 * CLIP_PRECISION).round(),
        y: (coord.y as f64 * CLIP_PRECISION).round(),
    }
}

fn unsnap(coord: &Coord<f64>) -> Coord<f32> {
    Coord {
        x: (coord.x / CLIP_PRECISION) as f32,
        y: (coord.y / CLIP_PRECISION) as f32,
    }
}

/// Intersects a polygon ring with the clip rectangle.
///
/// A ring which lies completely inside is returned unchanged. Otherwise the intersection can
/// consist of several disjoint rings, all of which are returned. Returns `None` if nothing of the
/// ring is inside.
pub fn clip_ring(ring: &[Coord<f32>], bounds: &ClipBounds) -> Option<Vec<Part>> {
    if ring.len() < 3 {
        return None;
    }

    let ring_bounds = rect_from_points(ring)?;
    if !intersects(&ring_bounds, &bounds.rect) {
        return None;
    }
    if contains_rect(&bounds.rect, &ring_bounds) {
        return Some(vec![ring.to_vec()]);
    }

    let subject = Polygon::new(
        LineString::new(ring.iter().map(|coord| snap(*coord)).collect()),
        vec![],
    );

    // geo's sweep asserts on some degenerate inputs
    let result = match panic::catch_unwind(AssertUnwindSafe(|| {
        subject.intersection(&bounds.polygon)
    })) {
        Ok(result) => result,
        Err(_) => {
            log::warn!("intersection of ring with {} points failed", ring.len());
            return None;
        }
    };

    let rings: Vec<Part> = result
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|line| line.coords().map(unsnap).collect::<Part>())
        .filter(|ring| ring.len() >= 3)
        .collect();

    if rings.is_empty() {
        None
    } else {
        Some(rings)
    }
}

/// Twice the signed area of the ring. Positive for rings which wind clockwise on screen, where the
/// y axis points down.
fn signed_area(ring: &[Coord<f32>]) -> f32 {
    if ring.len() < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum
}

/// True if the ring winds clockwise in screen space.
pub fn is_clockwise(ring: &[Coord<f32>]) -> bool {
    signed_area(ring) > 0.0
}
