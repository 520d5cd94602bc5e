//! Renders one vector tile with a style sheet.
//!
//! Rendering happens in two passes over the visual layers of a tile. The first pass draws
//! fills, strokes and icons in ascending z-index order. The second pass places labels, starting
//! with the highest z-index so that labels of upper layers win collisions.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    coords::TileCoordinate,
    error::RenderError,
    render::{
        settings::RendererSettings,
        surface::{DrawingSurface, IconProvider, RasterImage},
        text::FontCache,
    },
    style::{
        layer::RuleType,
        resolve::{ResolvedPaint, StyleResolver},
        StyleSheet,
    },
    tile::{group_layers_by_name, TileFeature, TileGeometry, TileLayer, VectorTile},
};

/// Per-render options supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderOptions {
    /// The tile data comes from a lower zoom level and is magnified. Geometry then reaches far
    /// beyond the tile and is clipped.
    pub over_zoomed: bool,
    /// Replaces the color of background rules.
    pub background_override: Option<tiny_skia::Color>,
}

/// One feature paired with its resolved paint.
#[derive(Debug, Clone)]
pub struct VisualLayer<'a> {
    pub feature: &'a TileFeature,
    pub paint: ResolvedPaint,
    pub source_layer: &'a str,
    pub rule_id: &'a str,
    pub z_index: i32,
}

pub struct TileRenderer {
    style: Arc<StyleSheet>,
    fonts: Arc<FontCache>,
    settings: RendererSettings,
    resolver: StyleResolver,
    icons: Option<Arc<dyn IconProvider>>,
}

impl TileRenderer {
    pub fn new(style: Arc<StyleSheet>, fonts: Arc<FontCache>, settings: RendererSettings) -> Self {
        Self {
            style,
            fonts,
            settings,
            resolver: StyleResolver,
            icons: None,
        }
    }

    pub fn with_icons(mut self, icons: Arc<dyn IconProvider>) -> Self {
        self.icons = Some(icons);
        self
    }

    pub fn style(&self) -> &StyleSheet {
        &self.style
    }

    pub fn fonts(&self) -> &Arc<FontCache> {
        &self.fonts
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Creates a surface matching the size and scale of `coords`.
    pub fn create_surface(&self, coords: &TileCoordinate) -> Result<DrawingSurface, RenderError> {
        DrawingSurface::new(
            coords.size_x,
            coords.size_y,
            coords.scale,
            self.fonts.clone(),
            self.settings.clone(),
        )
    }

    /// Collects the visual layers of `tile` in style order and draws background rules onto
    /// `surface` as they are encountered.
    pub fn build_visual_layers<'a>(
        &'a self,
        tile: &'a VectorTile,
        coords: &TileCoordinate,
        surface: &mut DrawingSurface,
        options: &RenderOptions,
    ) -> Vec<VisualLayer<'a>> {
        let zoom = coords.effective_zoom(self.settings.canonical_tile_size);
        self.collect_visual_layers(&tile.layers, coords, zoom, surface, options, true)
    }

    fn collect_visual_layers<'a>(
        &'a self,
        layers: &'a [TileLayer],
        coords: &TileCoordinate,
        zoom: f64,
        surface: &mut DrawingSurface,
        options: &RenderOptions,
        paint_background: bool,
    ) -> Vec<VisualLayer<'a>> {
        let by_name = group_layers_by_name(layers);

        let mut visual_layers = Vec::new();

        for rule in &self.style.layers {
            match rule.type_ {
                RuleType::Background => {
                    if let Some(color) = self.resolver.resolve_background(rule, zoom) {
                        let color = options.background_override.unwrap_or(color);
                        if paint_background {
                            surface.draw_background(color);
                        } else {
                            surface.record_background(color);
                        }
                    }
                    continue;
                }
                RuleType::Raster | RuleType::Other(_) => continue,
                RuleType::Fill | RuleType::Line | RuleType::Symbol => {}
            }

            let Some(source_layer) = rule.source_layer.as_deref() else {
                continue;
            };
            if !coords.allows_source_layer(source_layer) {
                continue;
            }
            let Some(tile_layers) = by_name.get(source_layer) else {
                continue;
            };

            for layer in tile_layers {
                for feature in &layer.features {
                    if let Some(paint) = self.resolver.resolve(rule, feature, zoom) {
                        visual_layers.push(VisualLayer {
                            feature,
                            z_index: paint.z_index,
                            paint,
                            source_layer: &layer.name,
                            rule_id: &rule.id,
                        });
                    }
                }
            }
        }

        visual_layers
    }

    /// Renders `tile` onto `surface`, starting a new drawing cycle.
    pub fn draw_tile(
        &self,
        surface: &mut DrawingSurface,
        tile: &VectorTile,
        coords: &TileCoordinate,
        options: &RenderOptions,
    ) {
        self.draw_layers(surface, &tile.layers, coords, options, true);
    }

    fn draw_layers(
        &self,
        surface: &mut DrawingSurface,
        layers: &[TileLayer],
        coords: &TileCoordinate,
        options: &RenderOptions,
        paint_background: bool,
    ) {
        let zoom = coords.effective_zoom(self.settings.canonical_tile_size);

        surface.start_drawing();
        surface.set_overflow_clipping(options.over_zoomed);

        let mut visual_layers =
            self.collect_visual_layers(layers, coords, zoom, surface, options, paint_background);
        visual_layers.sort_by_key(|layer| layer.z_index);

        let mut drawn = 0;
        for layer in &visual_layers {
            if Self::isolated(layer, || self.draw_visual_layer(surface, layer)) {
                drawn += 1;
            }
        }

        let mut labeled = 0;
        for layer in visual_layers.iter().rev() {
            if Self::isolated(layer, || self.draw_label(surface, layer)) {
                labeled += 1;
            }
        }

        log::trace!(
            "tile {} at zoom {:.2}: {} visual layers, {} drawn, {} labeled",
            coords,
            zoom,
            visual_layers.len(),
            drawn,
            labeled
        );
    }

    /// Runs one drawing step of `layer`. A panic is logged and skips only this feature.
    fn isolated(layer: &VisualLayer, draw: impl FnOnce() -> bool) -> bool {
        panic::catch_unwind(AssertUnwindSafe(draw)).unwrap_or_else(|_| {
            log::error!(
                "drawing feature {} of {} with layer {} panicked",
                layer.feature.id,
                layer.source_layer,
                layer.rule_id
            );
            false
        })
    }

    /// First pass: fills, strokes and icons. Returns false if nothing was drawn.
    fn draw_visual_layer(&self, surface: &mut DrawingSurface, layer: &VisualLayer) -> bool {
        let paint = &layer.paint;
        if !paint.visible {
            return false;
        }

        match &layer.feature.geometry {
            TileGeometry::Point(parts) => {
                let (Some(icon), Some(icons)) = (&paint.icon, &self.icons) else {
                    return self.check_mismatch(layer, paint.fill.is_some() || paint.line.is_some());
                };
                let mut drawn = false;
                for point in parts.iter().flatten() {
                    drawn |= surface.draw_point(*point, icon, icons.as_ref());
                }
                drawn
            }
            TileGeometry::LineString(parts) => {
                let Some(line) = &paint.line else {
                    return self.check_mismatch(layer, paint.fill.is_some());
                };
                for part in parts {
                    surface.draw_line_string(part, line);
                }
                true
            }
            TileGeometry::Polygon(parts) => {
                if let Some(fill) = &paint.fill {
                    let background_override = if self
                        .settings
                        .is_background_merge_layer(layer.source_layer)
                    {
                        surface.background()
                    } else {
                        None
                    };
                    for ring in parts {
                        surface.draw_polygon(ring, fill, background_override);
                    }
                    true
                } else if let Some(line) = &paint.line {
                    for ring in parts {
                        let mut outline = ring.clone();
                        if let Some(first) = ring.first() {
                            outline.push(*first);
                        }
                        surface.draw_line_string(&outline, line);
                    }
                    true
                } else {
                    false
                }
            }
            TileGeometry::Unknown(_) => self.draw_unknown(layer),
        }
    }

    fn check_mismatch(&self, layer: &VisualLayer, mismatched: bool) -> bool {
        if mismatched {
            log::warn!(
                "layer {} can not draw {} feature {}",
                layer.rule_id,
                layer.feature.geometry.geometry_type().as_str(),
                layer.feature.id
            );
        }
        false
    }

    fn draw_unknown(&self, layer: &VisualLayer) -> bool {
        log::debug!(
            "skipping feature {} of unknown geometry type in {}",
            layer.feature.id,
            layer.source_layer
        );
        false
    }

    /// Second pass: labels. Returns false if no label was placed.
    fn draw_label(&self, surface: &mut DrawingSurface, layer: &VisualLayer) -> bool {
        let Some(text) = layer.paint.text.as_ref().filter(|_| layer.paint.visible) else {
            return false;
        };

        let mut placed = false;
        match &layer.feature.geometry {
            TileGeometry::Point(parts) => {
                for point in parts.iter().flatten() {
                    placed |= surface.draw_text(*point, text);
                }
            }
            TileGeometry::LineString(parts) => {
                for part in parts {
                    placed |= surface.draw_text_on_path(part, text);
                }
            }
            TileGeometry::Polygon(_) | TileGeometry::Unknown(_) => {}
        }
        placed
    }

    pub fn render(
        &self,
        tile: &VectorTile,
        coords: &TileCoordinate,
        options: &RenderOptions,
    ) -> Result<RasterImage, RenderError> {
        let mut surface = self.create_surface(coords)?;
        self.draw_tile(&mut surface, tile, coords, options);
        Ok(surface.into_image())
    }

    /// Like [`TileRenderer::render`], but failures are logged instead of returned, so that
    /// callers rendering many tiles are not interrupted.
    pub fn try_render(
        &self,
        tile: &VectorTile,
        coords: &TileCoordinate,
        options: &RenderOptions,
    ) -> Option<RasterImage> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.render(tile, coords, options))) {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                log::error!("rendering tile {} failed: {}", coords, e);
                None
            }
            Err(_) => {
                log::error!("rendering tile {} panicked", coords);
                None
            }
        }
    }

    /// Renders the contribution of a single feature of `source_layer`. Background rules are not
    /// painted, so the result is transparent outside of the feature.
    pub fn render_feature(
        &self,
        feature: &TileFeature,
        source_layer: &str,
        coords: &TileCoordinate,
        options: &RenderOptions,
    ) -> Result<RasterImage, RenderError> {
        let layers = [TileLayer::new(source_layer, vec![feature.clone()])];
        let mut surface = self.create_surface(coords)?;
        self.draw_layers(&mut surface, &layers, coords, options, false);
        Ok(surface.into_image())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use geo_types::Coord;
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn c(x: f32, y: f32) -> Coord<f32> {
        Coord { x, y }
    }

    fn renderer(style: &str) -> TileRenderer {
        TileRenderer::new(
            Arc::new(StyleSheet::from_json(style).unwrap()),
            Arc::new(FontCache::new()),
            RendererSettings::default(),
        )
    }

    fn coords(size: u32) -> TileCoordinate {
        TileCoordinate::new(0, 0, 14.0, size, size, 1.0).unwrap()
    }

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> TileGeometry {
        TileGeometry::Polygon(vec![vec![c(x0, y0), c(x1, y0), c(x1, y1), c(x0, y1)]])
    }

    fn point(x: f32, y: f32) -> TileGeometry {
        TileGeometry::Point(vec![vec![c(x, y)]])
    }

    const GRAY: [u8; 4] = [128, 128, 128, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn test_background_only() {
        let renderer = renderer(
            r#"{"layers": [{"id": "bg", "type": "background",
                            "paint": {"background-color": "rgb(128, 128, 128)"}}]}"#,
        );
        let image = renderer
            .render(&VectorTile::default(), &coords(32), &RenderOptions::default())
            .unwrap();

        assert_eq!((image.width(), image.height()), (32, 32));
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(image.pixel(x, y), Some(GRAY));
            }
        }
    }

    #[test]
    fn test_background_override() {
        let renderer = renderer(
            r#"{"layers": [{"id": "bg", "type": "background",
                            "paint": {"background-color": "rgb(128, 128, 128)"}}]}"#,
        );
        let options = RenderOptions {
            background_override: Some(tiny_skia::Color::WHITE),
            ..Default::default()
        };
        let image = renderer
            .render(&VectorTile::default(), &coords(8), &options)
            .unwrap();

        assert_eq!(image.pixel(4, 4), Some(WHITE));
    }

    #[test]
    fn test_polygon_fill() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "buildings", "type": "fill", "source-layer": "building", "z-index": 0,
                 "paint": {"fill-color": "red", "fill-antialias": false}}
            ]}"#,
        );
        let tile = VectorTile::new(vec![TileLayer::new(
            "building",
            vec![TileFeature::new(1, square(10.0, 10.0, 30.0, 20.0))],
        )]);
        let image = renderer
            .render(&tile, &coords(64), &RenderOptions::default())
            .unwrap();

        for y in 0..64 {
            for x in 0..64 {
                let expected = if (10..30).contains(&x) && (10..20).contains(&y) {
                    RED
                } else {
                    WHITE
                };
                assert_eq!(image.pixel(x, y), Some(expected), "pixel {x},{y}");
            }
        }
    }

    #[test]
    fn test_higher_label_wins_collision() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "a-labels", "type": "symbol", "source-layer": "poi", "z-index": 1,
                 "filter": ["==", "name", "A"], "layout": {"text-field": "{name}"}},
                {"id": "b-labels", "type": "symbol", "source-layer": "poi", "z-index": 2,
                 "filter": ["==", "name", "B"], "layout": {"text-field": "{name}"}}
            ]}"#,
        );
        let tile = VectorTile::new(vec![TileLayer::new(
            "poi",
            vec![
                TileFeature::new(1, point(50.0, 50.0)).with_property("name", "A"),
                TileFeature::new(2, point(50.0, 50.0)).with_property("name", "B"),
            ],
        )]);
        let coords = coords(100);
        let mut surface = renderer.create_surface(&coords).unwrap();
        renderer.draw_tile(&mut surface, &tile, &coords, &RenderOptions::default());

        let labels: Vec<_> = surface
            .placed_labels()
            .iter()
            .map(|label| label.text.as_str())
            .collect();
        assert_eq!(labels, vec!["B"]);
    }

    #[test]
    fn test_over_zoomed_line_is_clipped() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "roads", "type": "line", "source-layer": "roads",
                 "paint": {"line-color": "red", "line-width": 4}}
            ]}"#,
        );
        let tile = VectorTile::new(vec![TileLayer::new(
            "roads",
            vec![TileFeature::new(
                1,
                TileGeometry::LineString(vec![vec![c(-5000.0, 50.0), c(5000.0, 50.0)]]),
            )],
        )]);
        let options = RenderOptions {
            over_zoomed: true,
            ..Default::default()
        };
        let image = renderer.render(&tile, &coords(100), &options).unwrap();

        assert_eq!(image.pixel(0, 49), Some(RED));
        assert_eq!(image.pixel(50, 50), Some(RED));
        assert_eq!(image.pixel(99, 50), Some(RED));
        assert_eq!(image.pixel(50, 40), Some(WHITE));
        assert_eq!(image.pixel(50, 60), Some(WHITE));
    }

    #[test]
    fn test_water_islands_take_background() {
        let style = r#"{"layers": [
            {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
            {"id": "water", "type": "fill", "source-layer": "water",
             "paint": {"fill-color": "blue"}},
            {"id": "lakes", "type": "fill", "source-layer": "lakes",
             "paint": {"fill-color": "blue"}}
        ]}"#;
        let sea = TileGeometry::Polygon(vec![vec![
            c(0.0, 0.0),
            c(0.0, 40.0),
            c(40.0, 40.0),
            c(40.0, 0.0),
        ]]);
        let island = square(10.0, 10.0, 30.0, 30.0);
        let lake = square(50.0, 50.0, 70.0, 70.0);
        let tile = VectorTile::new(vec![
            TileLayer::new(
                "water",
                vec![TileFeature::new(1, sea), TileFeature::new(2, island)],
            ),
            TileLayer::new("lakes", vec![TileFeature::new(3, lake)]),
        ]);
        let image = renderer(style)
            .render(&tile, &coords(80), &RenderOptions::default())
            .unwrap();

        // The clockwise island merges with the background, the counter clockwise sea does not.
        assert_eq!(image.pixel(5, 5), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(20, 20), Some(WHITE));
        // Only designated layers are affected.
        assert_eq!(image.pixel(60, 60), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_zoom_range_uses_effective_zoom() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "buildings", "type": "fill", "source-layer": "building", "minzoom": 13,
                 "paint": {"fill-color": "red"}}
            ]}"#,
        );
        let tile = VectorTile::new(vec![TileLayer::new(
            "building",
            vec![TileFeature::new(1, square(0.0, 0.0, 256.0, 256.0))],
        )]);

        // 256 pixel tiles at zoom 14 are styled like zoom 12.
        let small = TileCoordinate::new(0, 0, 14.0, 256, 256, 1.0).unwrap();
        let image = renderer.render(&tile, &small, &RenderOptions::default()).unwrap();
        assert_eq!(image.pixel(10, 10), Some(WHITE));

        let large = TileCoordinate::new(0, 0, 14.0, 1024, 1024, 0.25).unwrap();
        let image = renderer.render(&tile, &large, &RenderOptions::default()).unwrap();
        assert_eq!(image.pixel(1, 1), Some(RED));
    }

    #[test]
    fn test_source_layer_allow_list_and_visibility() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "buildings", "type": "fill", "source-layer": "building",
                 "paint": {"fill-color": "red"}},
                {"id": "parks", "type": "fill", "source-layer": "park",
                 "layout": {"visibility": "none"}, "paint": {"fill-color": "green"}}
            ]}"#,
        );
        let tile = VectorTile::new(vec![
            TileLayer::new("building", vec![TileFeature::new(1, square(0.0, 0.0, 10.0, 10.0))]),
            TileLayer::new("park", vec![TileFeature::new(2, square(10.0, 10.0, 20.0, 20.0))]),
        ]);

        let coords = coords(20).with_source_layers(["park"]);
        let image = renderer.render(&tile, &coords, &RenderOptions::default()).unwrap();

        // The allow-list hides buildings, the park rule is hidden by its visibility, and the
        // background is exempt from the allow-list.
        assert_eq!(image.pixel(5, 5), Some(WHITE));
        assert_eq!(image.pixel(15, 15), Some(WHITE));
    }

    #[test]
    fn test_duplicate_layer_names_are_merged() {
        let renderer = renderer(
            r#"{"layers": [{"id": "buildings", "type": "fill", "source-layer": "building",
                            "paint": {"fill-color": "red"}}]}"#,
        );
        let tile = VectorTile::new(vec![
            TileLayer::new("building", vec![TileFeature::new(1, square(0.0, 0.0, 10.0, 10.0))]),
            TileLayer::new("building", vec![TileFeature::new(2, square(10.0, 10.0, 20.0, 20.0))]),
        ]);
        let coords = coords(20);
        let mut surface = renderer.create_surface(&coords).unwrap();
        let layers = renderer.build_visual_layers(&tile, &coords, &mut surface, &RenderOptions::default());

        assert_eq!(
            layers.iter().map(|layer| layer.feature.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(layers.iter().all(|layer| layer.rule_id == "buildings"));
    }

    struct SingleIcon(Vec<u8>);

    impl IconProvider for SingleIcon {
        fn icon(&self, name: &str) -> Option<Vec<u8>> {
            (name == "dot").then(|| self.0.clone())
        }
    }

    #[test]
    fn test_icons() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(4, 4, Rgba(RED))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let renderer = renderer(
            r#"{"layers": [{"id": "poi", "type": "symbol", "source-layer": "poi",
                            "layout": {"icon-image": "{kind}"}}]}"#,
        )
        .with_icons(Arc::new(SingleIcon(png)));
        let tile = VectorTile::new(vec![TileLayer::new(
            "poi",
            vec![
                TileFeature::new(1, point(10.0, 10.0)).with_property("kind", "dot"),
                TileFeature::new(2, point(30.0, 30.0)).with_property("kind", "unknown"),
            ],
        )]);
        let image = renderer
            .render(&tile, &coords(40), &RenderOptions::default())
            .unwrap();

        assert_eq!(image.pixel(10, 10), Some(RED));
        assert_eq!(image.pixel(30, 30), Some([0, 0, 0, 0]));
    }

    struct BrokenIcons;

    impl IconProvider for BrokenIcons {
        fn icon(&self, name: &str) -> Option<Vec<u8>> {
            if name == "bad" {
                panic!("icon store is corrupt");
            }
            None
        }
    }

    #[test]
    fn test_failing_feature_does_not_lose_tile() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "buildings", "type": "fill", "source-layer": "building",
                 "paint": {"fill-color": "red", "fill-antialias": false}},
                {"id": "poi", "type": "symbol", "source-layer": "poi",
                 "layout": {"icon-image": "{kind}"}}
            ]}"#,
        )
        .with_icons(Arc::new(BrokenIcons));
        let tile = VectorTile::new(vec![
            TileLayer::new("building", vec![TileFeature::new(1, square(0.0, 0.0, 10.0, 10.0))]),
            TileLayer::new(
                "poi",
                vec![
                    TileFeature::new(2, point(15.0, 15.0)).with_property("kind", "bad"),
                    TileFeature::new(3, point(5.0, 15.0)).with_property("kind", "good"),
                ],
            ),
        ]);

        let image = renderer
            .try_render(&tile, &coords(20), &RenderOptions::default())
            .unwrap();

        assert_eq!(image.pixel(5, 5), Some(RED));
        assert_eq!(image.pixel(15, 15), Some(WHITE));
    }

    #[test]
    fn test_render_feature_and_try_render() {
        let renderer = renderer(
            r#"{"layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "white"}},
                {"id": "buildings", "type": "fill", "source-layer": "building",
                 "paint": {"fill-color": "red"}}
            ]}"#,
        );
        let feature = TileFeature::new(1, square(0.0, 0.0, 5.0, 5.0));
        let image = renderer
            .render_feature(&feature, "building", &coords(10), &RenderOptions::default())
            .unwrap();

        assert_eq!(image.pixel(2, 2), Some(RED));
        assert_eq!(image.pixel(8, 8), Some([0, 0, 0, 0]));

        let tile = VectorTile::new(vec![TileLayer::new("building", vec![feature])]);
        assert!(renderer
            .try_render(&tile, &coords(10), &RenderOptions::default())
            .is_some());
    }

    #[test]
    fn test_try_render_logs_invalid_surface() {
        let renderer = renderer(r#"{"layers": []}"#);
        let mut coords = coords(10);
        coords.size_x = 0;

        assert!(renderer
            .try_render(&VectorTile::default(), &coords, &RenderOptions::default())
            .is_none());
    }
}
