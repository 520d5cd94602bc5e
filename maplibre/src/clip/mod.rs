//! Clipping of tile geometry against the drawing area.
//!
//! Polylines are clipped segment by segment with out-codes. Polygon rings are intersected with the
//! rectangle, which can split one ring into several.

use bitflags::bitflags;
use geo_types::{Coord, Rect};

mod line;
mod polygon;

pub use line::{clip_line_string, clip_segment};
pub use polygon::{clip_ring, is_clockwise, ClipBounds};

bitflags! {
    /// Position of a point relative to the four half-planes of a clip rectangle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutCode: u8 {
        const LEFT = 0b0001;
        const RIGHT = 0b0010;
        const TOP = 0b0100;
        const BOTTOM = 0b1000;
    }
}

/// Computes the out-code of `point`. The rectangle edges count as inside.
pub fn out_code(point: Coord<f32>, rect: &Rect<f32>) -> OutCode {
    let mut code = OutCode::empty();

    if point.x < rect.min().x {
        code |= OutCode::LEFT;
    } else if point.x > rect.max().x {
        code |= OutCode::RIGHT;
    }

    if point.y < rect.min().y {
        code |= OutCode::TOP;
    } else if point.y > rect.max().y {
        code |= OutCode::BOTTOM;
    }

    code
}

/// Total length of the polyline.
pub fn path_length(points: &[Coord<f32>]) -> f32 {
    points
        .windows(2)
        .map(|segment| distance(segment[0], segment[1]))
        .sum()
}

pub(crate) fn distance(a: Coord<f32>, b: Coord<f32>) -> f32 {
    (b.x - a.x).hypot(b.y - a.y)
}
