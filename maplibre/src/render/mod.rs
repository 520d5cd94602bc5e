//! This module implements the rendering algorithm of maplibre-raster. It rasterizes the
//! features of a vector tile onto a [`surface::DrawingSurface`], following the rules of a
//! style sheet.

pub mod label_index;
pub mod settings;
pub mod surface;
pub mod text;
pub mod tile_renderer;
pub mod viewport;

pub use settings::RendererSettings;
pub use surface::{DrawingSurface, IconProvider, RasterEncoding, RasterImage};
pub use text::FontCache;
pub use tile_renderer::{RenderOptions, TileRenderer};
pub use viewport::{draw_tile_image, TilePlacement, Viewport};
