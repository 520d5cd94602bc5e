//! The drawing surface tiles are rasterized onto.

use std::{f32::consts::PI, io::Cursor, sync::Arc};

use geo_types::{Coord, Rect};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash,
    Transform,
};

use crate::{
    clip::{clip_line_string, clip_ring, distance, is_clockwise, path_length, ClipBounds},
    error::RenderError,
    render::{
        label_index::PlacedLabels,
        settings::RendererSettings,
        text::{
            apply_text_transform, estimate_text_width, measure_text, wrap_text, FontCache,
            FontFace, LoadedFont,
        },
    },
    style::{
        layer::{LineCap, LineJoin, TextJustify},
        resolve::{FillStyle, IconStyle, LineStyle, TextStyle},
    },
    util::math::{contains_rect, inflate, rect_from_points},
};

/// Distance from the vertical center of a text line down to its baseline, in ems.
const BASELINE_OFFSET: f32 = 0.35;

/// Source of icon images referenced by `icon-image`.
pub trait IconProvider: Send + Sync {
    /// Encoded (PNG or JPEG) image of the icon called `name`.
    fn icon(&self, name: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterEncoding {
    Png,
    Jpeg { quality: u8 },
}

/// A finished raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixmap: Pixmap,
}

impl RasterImage {
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight (not premultiplied) RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            Rgba(self.pixel(x, y).unwrap_or_default())
        })
    }

    pub fn encode(&self, encoding: RasterEncoding) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        let image = self.to_rgba_image();

        match encoding {
            RasterEncoding::Png => {
                image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            }
            RasterEncoding::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
                JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                    .encode_image(&rgb)?;
            }
        }

        Ok(bytes)
    }
}

fn solid_paint(color: tiny_skia::Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = anti_alias;
    paint
}

fn build_path(points: &[Coord<f32>], close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut builder = PathBuilder::new();
    builder.move_to(first.x, first.y);
    for point in rest {
        builder.line_to(point.x, point.y);
    }
    if close {
        builder.close();
    }
    builder.finish()
}

fn line_cap(cap: LineCap) -> tiny_skia::LineCap {
    match cap {
        LineCap::Butt => tiny_skia::LineCap::Butt,
        LineCap::Round => tiny_skia::LineCap::Round,
        LineCap::Square => tiny_skia::LineCap::Square,
    }
}

fn line_join(join: LineJoin) -> tiny_skia::LineJoin {
    match join {
        LineJoin::Miter => tiny_skia::LineJoin::Miter,
        LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        LineJoin::Round => tiny_skia::LineJoin::Round,
    }
}

/// Normalizes an angle difference into `[-PI, PI]`.
fn normalize_angle(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// True if the direction of two consecutive segments changes by more than `max_angle`.
/// Segments of zero length are ignored.
pub fn is_squeezed(points: &[Coord<f32>], max_angle: f32) -> bool {
    let angles: Vec<f32> = points
        .windows(2)
        .filter(|segment| distance(segment[0], segment[1]) > f32::EPSILON)
        .map(|segment| (segment[1].y - segment[0].y).atan2(segment[1].x - segment[0].x))
        .collect();

    angles
        .windows(2)
        .any(|pair| normalize_angle(pair[1] - pair[0]).abs() > max_angle)
}

/// Position and direction (radians) at `offset` along the polyline.
fn point_along(points: &[Coord<f32>], offset: f32) -> Option<(Coord<f32>, f32)> {
    let mut travelled = 0.0;
    let mut last = None;

    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let length = distance(a, b);
        if length <= f32::EPSILON {
            continue;
        }

        let angle = (b.y - a.y).atan2(b.x - a.x);
        if travelled + length >= offset {
            let t = ((offset - travelled) / length).max(0.0);
            let point = Coord {
                x: a.x + (b.x - a.x) * t,
                y: a.y + (b.y - a.y) * t,
            };
            return Some((point, angle));
        }

        travelled += length;
        last = Some((b, angle));
    }

    last
}

/// Left edge of each line of a label block centered on `center_x`. The block is as wide as its
/// widest line.
fn line_starts(center_x: f32, line_widths: &[f32], justify: TextJustify) -> Vec<f32> {
    let width = line_widths.iter().copied().fold(0.0, f32::max);
    let left = center_x - width / 2.0;
    line_widths
        .iter()
        .map(|line_width| left + (width - line_width) * justify.factor())
        .collect()
}

/// Orders a run so that it goes left to right. Text following it then reads upright.
fn upright(mut points: Vec<Coord<f32>>) -> Vec<Coord<f32>> {
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if last.x < first.x {
            points.reverse();
        }
    }
    points
}

/// A glyph outline with the transform which places it on the surface.
struct PlacedGlyph {
    path: tiny_skia::Path,
    transform: Transform,
    /// Font units per pixel, to convert halo widths.
    units_per_pixel: f32,
}

/// Raster canvas with the state of one render cycle: the clip rectangle, the background color and
/// the rectangles of placed labels.
///
/// Geometry is given in logical pixels. The device scale is applied when rasterizing.
pub struct DrawingSurface {
    pixmap: Pixmap,
    width: f32,
    height: f32,
    transform: Transform,
    fonts: Arc<FontCache>,
    settings: RendererSettings,
    clip: ClipBounds,
    overflow_clipping: bool,
    background: Option<tiny_skia::Color>,
    labels: PlacedLabels,
}

impl DrawingSurface {
    pub fn new(
        width: u32,
        height: u32,
        scale: f32,
        fonts: Arc<FontCache>,
        settings: RendererSettings,
    ) -> Result<Self, RenderError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::InvalidTileSize);
        }

        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSurfaceSize { width, height });
        }

        let pixel_width = ((width as f32 * scale).round() as u32).max(1);
        let pixel_height = ((height as f32 * scale).round() as u32).max(1);
        let pixmap = Pixmap::new(pixel_width, pixel_height).ok_or(
            RenderError::InvalidSurfaceSize {
                width: pixel_width,
                height: pixel_height,
            },
        )?;

        let clip = Self::clip_bounds(width as f32, height as f32, settings.clip_margin);
        Ok(Self {
            pixmap,
            width: width as f32,
            height: height as f32,
            transform: Transform::from_scale(scale, scale),
            fonts,
            settings,
            clip,
            overflow_clipping: false,
            background: None,
            labels: PlacedLabels::new(),
        })
    }

    fn clip_bounds(width: f32, height: f32, margin: f32) -> ClipBounds {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: width, y: height });
        ClipBounds::new(inflate(&bounds, margin))
    }

    /// Starts a render cycle: resets the clip rectangle, the placed labels and the background,
    /// and clears the canvas.
    pub fn start_drawing(&mut self) {
        self.clip = Self::clip_bounds(self.width, self.height, self.settings.clip_margin);
        self.labels.clear();
        self.background = None;
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    pub fn set_overflow_clipping(&mut self, enabled: bool) {
        self.overflow_clipping = enabled;
    }

    pub fn overflow_clipping(&self) -> bool {
        self.overflow_clipping
    }

    pub fn clip_rect(&self) -> &Rect<f32> {
        self.clip.rect()
    }

    /// The color of the last background drawn in this cycle.
    pub fn background(&self) -> Option<tiny_skia::Color> {
        self.background
    }

    pub fn placed_labels(&self) -> &PlacedLabels {
        &self.labels
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn draw_background(&mut self, color: tiny_skia::Color) {
        if let Some(rect) = tiny_skia::Rect::from_xywh(0.0, 0.0, self.width, self.height) {
            self.pixmap
                .fill_rect(rect, &solid_paint(color, false), self.transform, None);
        }
        self.background = Some(color);
    }

    /// Records the background color without painting it.
    pub fn record_background(&mut self, color: tiny_skia::Color) {
        self.background = Some(color);
    }

    pub fn draw_line_string(&mut self, points: &[Coord<f32>], style: &LineStyle) {
        if style.width <= 0.0 {
            return;
        }

        let parts = if self.overflow_clipping {
            match clip_line_string(points, self.clip.rect()) {
                Some(parts) => parts,
                None => return,
            }
        } else {
            vec![points.to_vec()]
        };

        let mut stroke = Stroke {
            width: style.width,
            line_cap: line_cap(style.cap),
            line_join: line_join(style.join),
            ..Stroke::default()
        };
        if let Some(dash) = &style.dash {
            stroke.dash = StrokeDash::new(dash.iter().map(|d| d * style.width).collect(), 0.0);
        }
        let paint = solid_paint(style.color, true);

        for part in parts {
            if let Some(path) = build_path(&part, false) {
                self.pixmap
                    .stroke_path(&path, &paint, &stroke, self.transform, None);
            }
        }
    }

    /// Fills one polygon ring.
    ///
    /// With `background_override` given, clockwise rings are filled with that color instead of
    /// the fill color.
    pub fn draw_polygon(
        &mut self,
        ring: &[Coord<f32>],
        style: &FillStyle,
        background_override: Option<tiny_skia::Color>,
    ) {
        let color = match background_override {
            Some(background) if is_clockwise(ring) => background,
            _ => style.color,
        };

        let rings = if self.overflow_clipping {
            match clip_ring(ring, &self.clip) {
                Some(rings) => rings,
                None => return,
            }
        } else {
            vec![ring.to_vec()]
        };

        let paint = solid_paint(color, style.antialias);
        for ring in rings {
            let Some(path) = build_path(&ring, true) else {
                continue;
            };
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, self.transform, None);

            if let Some(outline) = style.outline {
                let stroke = Stroke {
                    width: 1.0,
                    ..Stroke::default()
                };
                self.pixmap.stroke_path(
                    &path,
                    &solid_paint(outline, style.antialias),
                    &stroke,
                    self.transform,
                    None,
                );
            }
        }
    }

    /// Draws the icon of `style` centered on `point`. Returns false if the icon is unknown or can
    /// not be decoded.
    pub fn draw_point(
        &mut self,
        point: Coord<f32>,
        style: &IconStyle,
        icons: &dyn IconProvider,
    ) -> bool {
        match icons.icon(&style.name) {
            Some(data) => self.draw_image_scaled(point, &data, style.size, style.opacity),
            None => {
                log::debug!("icon {} is not available", style.name);
                false
            }
        }
    }

    /// Draws an encoded image centered on `point`. Images which fail to decode are skipped.
    pub fn draw_image(&mut self, point: Coord<f32>, data: &[u8], opacity: f32) -> bool {
        self.draw_image_scaled(point, data, 1.0, opacity)
    }

    fn draw_image_scaled(&mut self, point: Coord<f32>, data: &[u8], size: f32, opacity: f32) -> bool {
        let decoded = match image::load_from_memory(data) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(e) => {
                log::warn!("failed to decode image: {}", e);
                return false;
            }
        };

        let (width, height) = decoded.dimensions();
        let premultiplied: Vec<u8> = decoded
            .pixels()
            .flat_map(|pixel| {
                let [r, g, b, a] = pixel.0;
                let color = ColorU8::from_rgba(r, g, b, a).premultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();

        let Some(image) = IntSize::from_wh(width, height)
            .and_then(|size| Pixmap::from_vec(premultiplied, size))
        else {
            log::warn!("image of size {}x{} can not be drawn", width, height);
            return false;
        };

        let transform = self
            .transform
            .pre_translate(
                point.x - width as f32 * size / 2.0,
                point.y - height as f32 * size / 2.0,
            )
            .pre_scale(size, size);
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
        true
    }

    fn measure(&self, font: Option<&FontFace>, text: &str, size: f32) -> f32 {
        measure_text(font, text, size, self.settings.char_width_factor)
    }

    /// Places a label centered on `point`.
    ///
    /// Returns false without drawing if the label collides with a label placed earlier in this
    /// cycle, or leaves the clip rectangle while overflow clipping is enabled.
    pub fn draw_text(&mut self, point: Coord<f32>, style: &TextStyle) -> bool {
        let font = self.fonts.resolve(&style.fonts);
        let face = font.as_deref().and_then(LoadedFont::face);
        let face = face.as_ref();
        let size = style.size;

        let text = apply_text_transform(&style.text, style.transform);
        let lines = wrap_text(&text, style.max_width * size, |line| {
            self.measure(face, line, size)
        });
        if lines.is_empty() {
            return false;
        }

        let line_widths: Vec<f32> = lines
            .iter()
            .map(|line| self.measure(face, line, size))
            .collect();
        let width = line_widths.iter().copied().fold(0.0, f32::max);
        let line_height = size * self.settings.line_height;
        let height = lines.len() as f32 * line_height;

        let center = Coord {
            x: point.x + style.offset[0] * size,
            y: point.y + style.offset[1] * size,
        };
        let rect = Rect::new(
            Coord {
                x: center.x - width / 2.0,
                y: center.y - height / 2.0,
            },
            Coord {
                x: center.x + width / 2.0,
                y: center.y + height / 2.0,
            },
        );
        let rect = inflate(&rect, self.settings.label_padding);

        if self.overflow_clipping && !contains_rect(self.clip.rect(), &rect) {
            return false;
        }
        if self.labels.collides(&rect) {
            return false;
        }

        if let Some(face) = face {
            let mut glyphs = Vec::new();
            let top = center.y - height / 2.0;
            let starts = line_starts(center.x, &line_widths, style.justify);
            for (index, (line, start)) in lines.iter().zip(starts).enumerate() {
                let baseline = top + (index as f32 + 0.5) * line_height + BASELINE_OFFSET * size;
                let mut x = start;
                for c in line.chars() {
                    if let Some(path) = face.glyph_path(c) {
                        glyphs.push(PlacedGlyph {
                            path,
                            transform: self
                                .transform
                                .pre_concat(face.glyph_transform(size, x, baseline)),
                            units_per_pixel: face.units_per_em() / size,
                        });
                    }
                    x += face.advance(c, size);
                }
            }
            self.fill_glyphs(&glyphs, style);
        }

        self.labels.insert(rect, &text);
        true
    }

    /// Places a label along a polyline.
    ///
    /// Returns false without drawing if nothing of the path is visible, the path bends too
    /// sharply, the text does not fit along it, or it collides with a label placed earlier in
    /// this cycle.
    pub fn draw_text_on_path(&mut self, points: &[Coord<f32>], style: &TextStyle) -> bool {
        let Some(runs) = clip_line_string(points, self.clip.rect()) else {
            return false;
        };
        let Some(path) = runs
            .into_iter()
            .max_by(|a, b| path_length(a).total_cmp(&path_length(b)))
        else {
            return false;
        };

        if is_squeezed(&path, self.settings.max_squeeze_angle) {
            return false;
        }

        let size = style.size;
        let text = apply_text_transform(&style.text, style.transform).replace('\n', " ");
        let length = path_length(&path);
        if estimate_text_width(&text, size, self.settings.char_width_factor) > length {
            return false;
        }

        let path = upright(path);
        let Some(bounds) = rect_from_points(&path) else {
            return false;
        };
        let rect = inflate(&bounds, size / 2.0 + self.settings.label_padding);
        if self.labels.collides(&rect) {
            return false;
        }

        let font = self.fonts.resolve(&style.fonts);
        if let Some(face) = font.as_deref().and_then(LoadedFont::face) {
            let text_width = face.measure(&text, size);
            let mut offset = ((length - text_width) / 2.0).max(0.0);
            let mut glyphs = Vec::new();

            for c in text.chars() {
                let advance = face.advance(c, size);
                if let (Some(glyph), Some((anchor, angle))) =
                    (face.glyph_path(c), point_along(&path, offset + advance / 2.0))
                {
                    let transform = self
                        .transform
                        .pre_translate(anchor.x, anchor.y)
                        .pre_concat(Transform::from_rotate(angle.to_degrees()))
                        .pre_concat(face.glyph_transform(
                            size,
                            -advance / 2.0,
                            BASELINE_OFFSET * size,
                        ));
                    glyphs.push(PlacedGlyph {
                        path: glyph,
                        transform,
                        units_per_pixel: face.units_per_em() / size,
                    });
                }
                offset += advance;
            }
            self.fill_glyphs(&glyphs, style);
        }

        self.labels.insert(rect, &text);
        true
    }

    /// Draws the halo of all glyphs first, so that no halo covers a neighbouring glyph.
    fn fill_glyphs(&mut self, glyphs: &[PlacedGlyph], style: &TextStyle) {
        if style.halo_width > 0.0 && style.halo_color.alpha() > 0.0 {
            let paint = solid_paint(style.halo_color, true);
            for glyph in glyphs {
                let stroke = Stroke {
                    width: style.halo_width * 2.0 * glyph.units_per_pixel,
                    line_join: tiny_skia::LineJoin::Round,
                    ..Stroke::default()
                };
                self.pixmap
                    .stroke_path(&glyph.path, &paint, &stroke, glyph.transform, None);
            }
        }

        let paint = solid_paint(style.color, true);
        for glyph in glyphs {
            self.pixmap
                .fill_path(&glyph.path, &paint, FillRule::Winding, glyph.transform, None);
        }
    }

    /// Copy of the current canvas.
    pub fn snapshot(&self) -> RasterImage {
        RasterImage {
            pixmap: self.pixmap.clone(),
        }
    }

    pub fn into_image(self) -> RasterImage {
        RasterImage {
            pixmap: self.pixmap,
        }
    }

    pub fn to_raster_bytes(&self, encoding: RasterEncoding) -> Result<Vec<u8>, RenderError> {
        self.snapshot().encode(encoding)
    }
}
