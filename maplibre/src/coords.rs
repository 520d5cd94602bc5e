//! Provides utilities related to tile coordinates.

use std::{
    collections::HashSet,
    fmt,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Pixel size of the tiles the zoom ranges of most styles are designed for.
pub const CANONICAL_TILE_SIZE: f64 = 1024.0;

/// Identifies a tile and describes the raster which should be produced for it.
///
/// `size_x` and `size_y` are the logical pixel sizes. The geometry of the tile is expected to be
/// already normalized into this pixel space. The produced raster has the size
/// [`TileCoordinate::scaled_size_x`] by [`TileCoordinate::scaled_size_y`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub x: i32,
    pub y: i32,
    pub zoom: f64,
    pub size_x: u32,
    pub size_y: u32,
    pub scale: f32,
    /// Only rules which target one of these source layers are rendered. Background rules are
    /// always rendered.
    #[serde(default)]
    pub source_layers: Option<HashSet<String>>,
}

impl TileCoordinate {
    pub fn new(
        x: i32,
        y: i32,
        zoom: f64,
        size_x: u32,
        size_y: u32,
        scale: f32,
    ) -> Result<Self, RenderError> {
        if size_x == 0 || size_y == 0 || !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::InvalidTileSize);
        }

        Ok(Self {
            x,
            y,
            zoom,
            size_x,
            size_y,
            scale,
            source_layers: None,
        })
    }

    pub fn with_source_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_layers = Some(layers.into_iter().map(Into::into).collect());
        self
    }

    pub fn scaled_size_x(&self) -> u32 {
        ((self.size_x as f32 * self.scale).round() as u32).max(1)
    }

    pub fn scaled_size_y(&self) -> u32 {
        ((self.size_y as f32 * self.scale).round() as u32).max(1)
    }

    /// Tiles which are rendered smaller than the canonical size are styled as if they were at a
    /// lower zoom, so that zoom ranges match what the style author saw.
    pub fn effective_zoom(&self, canonical_size: f64) -> f64 {
        let size = self.size_x as f64;
        if size < canonical_size {
            self.zoom - (canonical_size / size).log2()
        } else {
            self.zoom
        }
    }

    pub fn allows_source_layer(&self, source_layer: &str) -> bool {
        self.source_layers
            .as_ref()
            .map_or(true, |layers| layers.contains(source_layer))
    }
}

impl Display for TileCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "T(x={x},y={y},z={z})", x = self.x, y = self.y, z = self.zoom)
    }
}
