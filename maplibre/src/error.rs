//! Errors which can happen in various parts of the library.

use std::io;

use thiserror::Error;

use crate::style::StyleError;

/// Failures of the renderer which are reported to the caller.
///
/// "Nothing to draw" situations (empty clip results, label collisions, squeezed paths) are not
/// errors. Drawing calls silently skip those.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("surface of size {width}x{height} can not be allocated")]
    InvalidSurfaceSize { width: u32, height: u32 },
    #[error("tile size and scale must be greater than zero")]
    InvalidTileSize,
    #[error("image could not be encoded or decoded")]
    Image(#[from] image::ImageError),
    #[error("font could not be parsed: {0}")]
    Font(String),
    #[error("reading from disk failed")]
    Io(#[from] io::Error),
    #[error("style is invalid")]
    Style(#[from] StyleError),
}
