use std::mem;

use geo_types::{Coord, Rect};

use crate::{
    clip::{out_code, OutCode},
    tile::Part,
    util::math::{rect_from_points, touches},
};

/// Every endpoint is moved at most twice, once per axis.
const MAX_CLIP_STEPS: usize = 4;

/// Clips the segment `a`-`b` against `rect`. Returns `None` if no part of the segment is inside.
pub fn clip_segment(
    mut a: Coord<f32>,
    mut b: Coord<f32>,
    rect: &Rect<f32>,
) -> Option<(Coord<f32>, Coord<f32>)> {
    let mut code_a = out_code(a, rect);
    let mut code_b = out_code(b, rect);

    for _ in 0..=MAX_CLIP_STEPS {
        if (code_a | code_b).is_empty() {
            return Some((a, b));
        }
        if code_a.intersects(code_b) {
            return None;
        }

        if !code_a.is_empty() {
            a = move_to_boundary(a, b, code_a, rect);
            code_a = out_code(a, rect);
        } else {
            b = move_to_boundary(b, a, code_b, rect);
            code_b = out_code(b, rect);
        }
    }

    log::trace!("segment clipping did not converge, dropping segment");
    None
}

/// Moves the outside point `from` along the segment towards `to` onto the first violated
/// boundary.
fn move_to_boundary(
    from: Coord<f32>,
    to: Coord<f32>,
    code: OutCode,
    rect: &Rect<f32>,
) -> Coord<f32> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let (min, max) = (rect.min(), rect.max());

    if code.contains(OutCode::TOP) {
        Coord {
            x: from.x + dx * (min.y - from.y) / dy,
            y: min.y,
        }
    } else if code.contains(OutCode::BOTTOM) {
        Coord {
            x: from.x + dx * (max.y - from.y) / dy,
            y: max.y,
        }
    } else if code.contains(OutCode::RIGHT) {
        Coord {
            x: max.x,
            y: from.y + dy * (max.x - from.x) / dx,
        }
    } else {
        Coord {
            x: min.x,
            y: from.y + dy * (min.x - from.x) / dx,
        }
    }
}

/// Clips a polyline against `rect`.
///
/// Contiguous visible segments are merged into one run. A polyline which leaves and re-enters the
/// rectangle yields one run per visible stretch. Returns `None` if nothing is visible, without
/// looking at individual segments when the bounding box of the polyline misses the rectangle.
pub fn clip_line_string(points: &[Coord<f32>], rect: &Rect<f32>) -> Option<Vec<Part>> {
    if points.len() < 2 {
        return None;
    }

    let bounds = rect_from_points(points)?;
    if !touches(&bounds, rect) {
        return None;
    }

    let mut runs = Vec::new();
    let mut current: Part = Vec::new();

    for segment in points.windows(2) {
        match clip_segment(segment[0], segment[1], rect) {
            Some((a, b)) => {
                if current.last() != Some(&a) {
                    finish_run(&mut runs, &mut current);
                    current.push(a);
                }
                current.push(b);
            }
            None => finish_run(&mut runs, &mut current),
        }
    }
    finish_run(&mut runs, &mut current);

    if runs.is_empty() {
        None
    } else {
        Some(runs)
    }
}

fn finish_run(runs: &mut Vec<Part>, current: &mut Part) {
    if current.len() >= 2 {
        runs.push(mem::take(current));
    } else {
        current.clear();
    }
}
