use geo_types::{Coord, Rect};

/// Returns the minimum and maximum corner of the given points, or `None` if there are no points.
pub fn bounds_from_points<P, T>(points: impl Iterator<Item = P>) -> Option<([T; 2], [T; 2])>
where
    P: Into<[T; 2]>,
    T: PartialOrd + Copy,
{
    let mut min: Option<[T; 2]> = None;
    let mut max: Option<[T; 2]> = None;

    for point in points {
        let [x, y] = point.into();

        if let Some([min_x, min_y]) = &mut min {
            if x < *min_x {
                *min_x = x;
            }
            if y < *min_y {
                *min_y = y;
            }
        } else {
            min = Some([x, y])
        }

        if let Some([max_x, max_y]) = &mut max {
            if x > *max_x {
                *max_x = x;
            }
            if y > *max_y {
                *max_y = y;
            }
        } else {
            max = Some([x, y])
        }
    }

    if let (Some(min), Some(max)) = (min, max) {
        Some((min, max))
    } else {
        None
    }
}

pub fn rect_from_points(points: &[Coord<f32>]) -> Option<Rect<f32>> {
    bounds_from_points(points.iter().map(|point| [point.x, point.y]))
        .map(|(min, max)| Rect::new(Coord::from(min), Coord::from(max)))
}

/// Grows the rectangle by `amount` on every side.
pub fn inflate(rect: &Rect<f32>, amount: f32) -> Rect<f32> {
    Rect::new(
        Coord {
            x: rect.min().x - amount,
            y: rect.min().y - amount,
        },
        Coord {
            x: rect.max().x + amount,
            y: rect.max().y + amount,
        },
    )
}

/// True if `inner` lies within `outer`, touching edges included.
pub fn contains_rect(outer: &Rect<f32>, inner: &Rect<f32>) -> bool {
    inner.min().x >= outer.min().x
        && inner.min().y >= outer.min().y
        && inner.max().x <= outer.max().x
        && inner.max().y <= outer.max().y
}

/// True if the interiors of both rectangles overlap. Touching edges do not count.
pub fn intersects(a: &Rect<f32>, b: &Rect<f32>) -> bool {
    a.min().x < b.max().x && b.min().x < a.max().x && a.min().y < b.max().y && b.min().y < a.max().y
}

/// Like [`intersects`], but touching edges count as intersection.
pub fn touches(a: &Rect<f32>, b: &Rect<f32>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}
