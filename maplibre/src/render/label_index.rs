//! Rectangles of labels placed during one render cycle.

use geo_types::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::util::math::intersects;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub rect: Rect<f32>,
    pub text: String,
}

#[derive(Debug, Clone)]
struct IndexedRect {
    rect: Rect<f32>,
}

impl RTreeObject for IndexedRect {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope(&self.rect)
    }
}

fn envelope(rect: &Rect<f32>) -> AABB<[f32; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}

/// Label rectangles in placement order, with a spatial index for collision queries.
#[derive(Debug, Default)]
pub struct PlacedLabels {
    tree: RTree<IndexedRect>,
    labels: Vec<PlacedLabel>,
}

impl PlacedLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `rect` overlaps any placed label. Labels which only touch do not collide.
    pub fn collides(&self, rect: &Rect<f32>) -> bool {
        self.tree
            .locate_in_envelope_intersecting(&envelope(rect))
            .any(|placed| intersects(&placed.rect, rect))
    }

    pub fn insert(&mut self, rect: Rect<f32>, text: &str) {
        self.tree.insert(IndexedRect { rect });
        self.labels.push(PlacedLabel {
            rect,
            text: text.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.labels.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedLabel> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Coord;

    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect<f32> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    #[test]
    fn test_collisions() {
        let mut labels = PlacedLabels::new();
        assert!(!labels.collides(&rect(0.0, 0.0, 10.0, 10.0)));

        labels.insert(rect(0.0, 0.0, 10.0, 10.0), "Berlin");
        labels.insert(rect(50.0, 50.0, 60.0, 55.0), "Potsdam");

        assert!(labels.collides(&rect(5.0, 5.0, 20.0, 20.0)));
        assert!(labels.collides(&rect(55.0, 40.0, 56.0, 70.0)));
        assert!(!labels.collides(&rect(10.0, 0.0, 20.0, 10.0)));
        assert!(!labels.collides(&rect(20.0, 20.0, 40.0, 40.0)));

        assert_eq!(
            labels.iter().map(|label| label.text.as_str()).collect::<Vec<_>>(),
            vec!["Berlin", "Potsdam"]
        );
    }

    #[test]
    fn test_clear() {
        let mut labels = PlacedLabels::new();
        labels.insert(rect(0.0, 0.0, 10.0, 10.0), "Berlin");
        labels.clear();

        assert!(labels.is_empty());
        assert!(!labels.collides(&rect(0.0, 0.0, 10.0, 10.0)));
    }
}
