//! # maplibre-raster
//!
//! A CPU rasterizer for vector map tiles.
//!
//! Given a decoded [`tile::VectorTile`] whose geometry is already in tile pixel space and a
//! [`style::StyleSheet`] in MapLibre style JSON, a [`render::TileRenderer`] produces a raster
//! image of the tile. Features are clipped to the tile, painted in z-index order and labelled
//! without overlaps. A [`cache::FeatureRenderCache`] keeps rendered feature images between
//! render passes, and [`render::viewport`] places finished tiles onto a rotated or scaled screen.
//!
//! ### Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use maplibre_raster::{
//!     coords::TileCoordinate,
//!     render::{FontCache, RenderOptions, RendererSettings, TileRenderer},
//!     style::StyleSheet,
//!     tile::VectorTile,
//! };
//!
//! let renderer = TileRenderer::new(
//!     Arc::new(StyleSheet::default()),
//!     Arc::new(FontCache::new()),
//!     RendererSettings::default(),
//! );
//! let coords = TileCoordinate::new(0, 0, 3.0, 256, 256, 1.0).unwrap();
//! let image = renderer
//!     .render(&VectorTile::default(), &coords, &RenderOptions::default())
//!     .unwrap();
//! assert_eq!(image.width(), 256);
//! ```

pub mod cache;
pub mod clip;
pub mod coords;
pub mod error;
pub mod render;
pub mod style;
pub mod tile;
pub mod util;
