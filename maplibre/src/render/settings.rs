//! Settings for the renderer

use std::f32::consts::FRAC_PI_3;

use serde::{Deserialize, Serialize};

use crate::coords::CANONICAL_TILE_SIZE;

/// Tunables of the tile renderer and its drawing surfaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Pixel size the zoom ranges of styles are designed for.
    pub canonical_tile_size: f64,
    /// Distance by which the clip rectangle extends beyond the tile, so that strokes do not end
    /// visibly at tile seams.
    pub clip_margin: f32,
    /// Space kept free around every placed label.
    pub label_padding: f32,
    /// Estimated width of one character as a fraction of the text size. Used to decide whether
    /// text fits along a path, and for measuring when no font is available.
    pub char_width_factor: f32,
    /// Line height of wrapped text in ems.
    pub line_height: f32,
    /// Largest direction change between two consecutive path segments, in radians, that text
    /// can follow.
    pub max_squeeze_angle: f32,
    /// Source layers whose clockwise rings are filled with the background color.
    ///
    /// Water polygons of some tile sets contain islands as clockwise rings drawn on top of the
    /// water. Filling those with the background merges them with the land around the tile.
    pub background_merge_layers: Vec<String>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            canonical_tile_size: CANONICAL_TILE_SIZE,
            clip_margin: 5.0,
            label_padding: 2.0,
            char_width_factor: 0.6,
            line_height: 1.2,
            max_squeeze_angle: FRAC_PI_3,
            background_merge_layers: vec!["water".to_string()],
        }
    }
}

impl RendererSettings {
    pub fn is_background_merge_layer(&self, source_layer: &str) -> bool {
        self.background_merge_layers
            .iter()
            .any(|layer| layer == source_layer)
    }
}
