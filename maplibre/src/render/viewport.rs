//! Placement of finished tile rasters onto a screen.

use cgmath::{Angle, Deg};
use geo_types::{Coord, Rect};
use tiny_skia::{FilterQuality, IntRect, Pixmap, PixmapPaint, Transform};

use crate::render::surface::RasterImage;

const ROTATION_EPSILON: f64 = 1e-9;

/// The visible part of the world. World coordinates have their y axis pointing up, screen
/// coordinates have it pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coord<f64>,
    /// World units per screen pixel.
    pub resolution: f64,
    /// Clockwise rotation of the map on screen.
    pub rotation: Deg<f64>,
    pub width: u32,
    pub height: u32,
}

/// Where a tile image ends up on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TilePlacement {
    /// Image pixels are mapped to the screen by a transform.
    Transformed(Transform),
    /// The image is stretched into an integer rectangle of the screen.
    Aligned(IntRect),
}

impl Viewport {
    pub fn new<R: Into<Deg<f64>>>(
        center: Coord<f64>,
        resolution: f64,
        rotation: R,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            center,
            resolution,
            rotation: rotation.into(),
            width,
            height,
        }
    }

    pub fn is_rotated(&self) -> bool {
        let degrees = self.rotation.normalize().0;
        degrees > ROTATION_EPSILON && degrees < 360.0 - ROTATION_EPSILON
    }

    /// Screen position of a world coordinate, ignoring the rotation.
    fn unrotated_screen(&self, world: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.width as f64 / 2.0 + (world.x - self.center.x) / self.resolution,
            y: self.height as f64 / 2.0 + (self.center.y - world.y) / self.resolution,
        }
    }

    /// Computes how an image of `image_size` pixels covering `world_extent` is drawn onto the
    /// screen. `prior` is the transform already active on the target.
    ///
    /// Unrotated viewports place the image into a rectangle with rounded corners, so that
    /// neighbouring tiles share their edges exactly.
    pub fn tile_placement(
        &self,
        world_extent: Rect<f64>,
        image_size: (u32, u32),
        prior: Transform,
    ) -> TilePlacement {
        if !self.is_rotated() {
            let top_left = self.unrotated_screen(Coord {
                x: world_extent.min().x,
                y: world_extent.max().y,
            });
            let bottom_right = self.unrotated_screen(Coord {
                x: world_extent.max().x,
                y: world_extent.min().y,
            });

            if let Some(rect) = IntRect::from_ltrb(
                top_left.x.round() as i32,
                top_left.y.round() as i32,
                bottom_right.x.round() as i32,
                bottom_right.y.round() as i32,
            ) {
                return TilePlacement::Aligned(rect);
            }
        }

        let (image_width, image_height) = image_size;
        let inverse_resolution = (1.0 / self.resolution) as f32;
        let offset_x = ((world_extent.min().x - self.center.x) / self.resolution) as f32;
        let offset_y = ((self.center.y - world_extent.max().y) / self.resolution) as f32;

        let transform = Transform::from_scale(
            (world_extent.width() / image_width.max(1) as f64) as f32,
            (world_extent.height() / image_height.max(1) as f64) as f32,
        )
        .post_scale(inverse_resolution, inverse_resolution)
        .post_translate(offset_x, offset_y)
        .post_concat(Transform::from_rotate(self.rotation.0 as f32))
        .post_translate(self.width as f32 / 2.0, self.height as f32 / 2.0)
        .post_concat(prior);

        TilePlacement::Transformed(transform)
    }
}

/// Draws a rendered tile covering `world_extent` onto `target`.
pub fn draw_tile_image(
    target: &mut Pixmap,
    image: &RasterImage,
    viewport: &Viewport,
    world_extent: Rect<f64>,
    prior: Transform,
) {
    let size = (image.width(), image.height());
    let mut paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };

    let transform = match viewport.tile_placement(world_extent, size, prior) {
        TilePlacement::Transformed(transform) => transform,
        TilePlacement::Aligned(rect) => {
            if (rect.width(), rect.height()) == size {
                paint.quality = FilterQuality::Nearest;
            }
            Transform::from_scale(
                rect.width() as f32 / size.0 as f32,
                rect.height() as f32 / size.1 as f32,
            )
            .post_translate(rect.x() as f32, rect.y() as f32)
            .post_concat(prior)
        }
    };

    log::trace!("drawing tile image {}x{} with {:?}", size.0, size.1, transform);
    target.draw_pixmap(0, 0, image.pixmap().as_ref(), &paint, transform, None);
}
