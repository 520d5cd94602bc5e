//! Resolution of style rules into concrete paint for one feature.

use csscolorparser::Color;

use crate::{
    style::{
        expression::{EvaluationContext, FromStyleValue, StyleProperty},
        layer::{
            LayerPaint, LineCap, LineJoin, RuleType, StyleRule, TextJustify, TextTransform,
            Visibility,
        },
    },
    tile::TileFeature,
};

pub const DEFAULT_TEXT_SIZE: f32 = 16.0;
pub const DEFAULT_TEXT_MAX_WIDTH: f32 = 10.0;
pub const DEFAULT_FONTS: &[&str] = &["Open Sans Regular", "Arial Unicode MS Regular"];

#[derive(Debug, Clone, PartialEq)]
pub struct FillStyle {
    pub color: tiny_skia::Color,
    pub outline: Option<tiny_skia::Color>,
    pub antialias: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: tiny_skia::Color,
    pub width: f32,
    /// Dash pattern in multiples of the line width.
    pub dash: Option<Vec<f32>>,
    pub cap: LineCap,
    pub join: LineJoin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Never empty.
    pub text: String,
    pub fonts: Vec<String>,
    pub size: f32,
    pub color: tiny_skia::Color,
    pub halo_color: tiny_skia::Color,
    pub halo_width: f32,
    /// Offset of the label from its anchor, in ems.
    pub offset: [f32; 2],
    pub transform: TextTransform,
    pub justify: TextJustify,
    /// Wrapping width in ems.
    pub max_width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub name: String,
    pub size: f32,
    pub opacity: f32,
}

/// Concrete paint of one feature under one style rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaint {
    pub visible: bool,
    pub z_index: i32,
    pub fill: Option<FillStyle>,
    pub line: Option<LineStyle>,
    pub text: Option<TextStyle>,
    pub icon: Option<IconStyle>,
}

impl ResolvedPaint {
    fn new(visible: bool, z_index: i32) -> Self {
        Self {
            visible,
            z_index,
            fill: None,
            line: None,
            text: None,
            icon: None,
        }
    }
}

pub fn to_skia_color(color: &Color, opacity: f32) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_rgba8();
    let mut color = tiny_skia::Color::from_rgba8(r, g, b, a);
    color.apply_opacity(opacity);
    color
}

fn eval<T: FromStyleValue + Clone>(
    property: &Option<StyleProperty<T>>,
    context: &EvaluationContext,
) -> Option<T> {
    property
        .as_ref()
        .and_then(|property| property.evaluate(context))
}

fn black() -> Color {
    Color::from_rgba8(0, 0, 0, 255)
}

/// Evaluates style rules against features.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleResolver;

impl StyleResolver {
    fn is_visible(rule: &StyleRule, context: &EvaluationContext) -> bool {
        rule.paint
            .visibility()
            .and_then(|visibility| visibility.evaluate(context))
            .map_or(true, |visibility| visibility == Visibility::Visible)
    }

    /// Resolves the paint of `feature` under `rule` at `zoom`.
    ///
    /// Returns `None` if the rule does not apply: the zoom is out of range, the filter rejects the
    /// feature, or the rule is a background or raster rule. A rule which applies but is hidden
    /// through its `visibility` property yields paint with `visible` set to false.
    pub fn resolve(&self, rule: &StyleRule, feature: &TileFeature, zoom: f64) -> Option<ResolvedPaint> {
        match rule.type_ {
            RuleType::Background | RuleType::Raster | RuleType::Other(_) => return None,
            RuleType::Fill | RuleType::Line | RuleType::Symbol => {}
        }

        if !rule.in_zoom_range(zoom) {
            return None;
        }

        let context = EvaluationContext::new(zoom)
            .with_feature(
                feature.id,
                feature.geometry.geometry_type(),
                &feature.properties,
            )
            .with_layer(&rule.id);

        if let Some(filter) = &rule.filter {
            if !filter.matches(&context) {
                return None;
            }
        }

        let mut resolved = ResolvedPaint::new(Self::is_visible(rule, &context), rule.z_index());

        match &rule.paint {
            LayerPaint::Fill(paint) => {
                let opacity = eval(&paint.fill_opacity, &context).unwrap_or(1.0);
                resolved.fill = Some(FillStyle {
                    color: to_skia_color(
                        &eval(&paint.fill_color, &context).unwrap_or_else(black),
                        opacity,
                    ),
                    outline: eval(&paint.fill_outline_color, &context)
                        .map(|color| to_skia_color(&color, opacity)),
                    antialias: eval(&paint.fill_antialias, &context).unwrap_or(true),
                });
            }
            LayerPaint::Line(paint) => {
                let opacity = eval(&paint.line_opacity, &context).unwrap_or(1.0);
                resolved.line = Some(LineStyle {
                    color: to_skia_color(
                        &eval(&paint.line_color, &context).unwrap_or_else(black),
                        opacity,
                    ),
                    width: eval(&paint.line_width, &context).unwrap_or(1.0),
                    dash: eval(&paint.line_dasharray, &context)
                        .filter(|dash| !dash.is_empty()),
                    cap: eval(&paint.line_cap, &context).unwrap_or_default(),
                    join: eval(&paint.line_join, &context).unwrap_or_default(),
                });
            }
            LayerPaint::Symbol(paint) => {
                let text = eval(&paint.text_field, &context)
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty());

                if let Some(text) = text {
                    let opacity = eval(&paint.text_opacity, &context).unwrap_or(1.0);
                    resolved.text = Some(TextStyle {
                        text,
                        fonts: eval(&paint.text_font, &context).unwrap_or_else(|| {
                            DEFAULT_FONTS.iter().map(|font| font.to_string()).collect()
                        }),
                        size: eval(&paint.text_size, &context).unwrap_or(DEFAULT_TEXT_SIZE),
                        color: to_skia_color(
                            &eval(&paint.text_color, &context).unwrap_or_else(black),
                            opacity,
                        ),
                        halo_color: eval(&paint.text_halo_color, &context)
                            .map(|color| to_skia_color(&color, opacity))
                            .unwrap_or(tiny_skia::Color::TRANSPARENT),
                        halo_width: eval(&paint.text_halo_width, &context).unwrap_or(0.0),
                        offset: eval(&paint.text_offset, &context).unwrap_or([0.0, 0.0]),
                        transform: eval(&paint.text_transform, &context).unwrap_or_default(),
                        justify: eval(&paint.text_justify, &context).unwrap_or_default(),
                        max_width: eval(&paint.text_max_width, &context)
                            .unwrap_or(DEFAULT_TEXT_MAX_WIDTH),
                    });
                }

                resolved.icon = eval(&paint.icon_image, &context)
                    .filter(|name| !name.is_empty())
                    .map(|name| IconStyle {
                        name,
                        size: eval(&paint.icon_size, &context).unwrap_or(1.0),
                        opacity: eval(&paint.icon_opacity, &context).unwrap_or(1.0),
                    });
            }
            _ => {
                log::warn!("layer {} has no paint matching its type", rule.id);
                return None;
            }
        }

        Some(resolved)
    }

    /// Resolves the color of a background rule. Returns `None` for other rules and for background
    /// rules which are out of range or hidden.
    pub fn resolve_background(&self, rule: &StyleRule, zoom: f64) -> Option<tiny_skia::Color> {
        let LayerPaint::Background(paint) = &rule.paint else {
            return None;
        };
        if rule.type_ != RuleType::Background || !rule.in_zoom_range(zoom) {
            return None;
        }

        let context = EvaluationContext::new(zoom).with_layer(&rule.id);
        if !Self::is_visible(rule, &context) {
            return None;
        }

        let opacity = eval(&paint.background_opacity, &context).unwrap_or(1.0);
        Some(to_skia_color(
            &eval(&paint.background_color, &context).unwrap_or_else(black),
            opacity,
        ))
    }
}
