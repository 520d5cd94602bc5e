//! Vector tile layer drawing utilities.

use std::{
    hash::{Hash, Hasher},
    str::FromStr,
};

use csscolorparser::Color;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::style::{
    expression::{keyword_style_value, StyleProperty},
    filter::Filter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    None,
}

impl FromStr for Visibility {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(Visibility::Visible),
            "none" => Ok(Visibility::None),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl FromStr for LineCap {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "butt" => Ok(LineCap::Butt),
            "round" => Ok(LineCap::Round),
            "square" => Ok(LineCap::Square),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Bevel,
    Round,
}

impl FromStr for LineJoin {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "miter" => Ok(LineJoin::Miter),
            "bevel" => Ok(LineJoin::Bevel),
            "round" => Ok(LineJoin::Round),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
}

impl FromStr for TextTransform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TextTransform::None),
            "uppercase" => Ok(TextTransform::Uppercase),
            "lowercase" => Ok(TextTransform::Lowercase),
            _ => Err(()),
        }
    }
}

/// Horizontal alignment of the lines of a multi-line label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextJustify {
    /// Treated as center, there is no anchor to align to.
    Auto,
    Left,
    #[default]
    Center,
    Right,
}

impl TextJustify {
    /// Share of the free space left of a line: 0 for left, 1 for right.
    pub fn factor(self) -> f32 {
        match self {
            TextJustify::Left => 0.0,
            TextJustify::Right => 1.0,
            TextJustify::Auto | TextJustify::Center => 0.5,
        }
    }
}

impl FromStr for TextJustify {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(TextJustify::Auto),
            "left" => Ok(TextJustify::Left),
            "center" => Ok(TextJustify::Center),
            "right" => Ok(TextJustify::Right),
            _ => Err(()),
        }
    }
}

keyword_style_value!(Visibility, LineCap, LineJoin, TextTransform, TextJustify);

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BackgroundPaint {
    #[serde(rename = "background-color", default)]
    pub background_color: Option<StyleProperty<Color>>,
    #[serde(rename = "background-opacity", default)]
    pub background_opacity: Option<StyleProperty<f32>>,
    #[serde(default)]
    pub visibility: Option<StyleProperty<Visibility>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FillPaint {
    #[serde(rename = "fill-color", default)]
    pub fill_color: Option<StyleProperty<Color>>,
    #[serde(rename = "fill-opacity", default)]
    pub fill_opacity: Option<StyleProperty<f32>>,
    #[serde(rename = "fill-outline-color", default)]
    pub fill_outline_color: Option<StyleProperty<Color>>,
    #[serde(rename = "fill-antialias", default)]
    pub fill_antialias: Option<StyleProperty<bool>>,
    #[serde(default)]
    pub visibility: Option<StyleProperty<Visibility>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LinePaint {
    #[serde(rename = "line-color", default)]
    pub line_color: Option<StyleProperty<Color>>,
    #[serde(rename = "line-width", default)]
    pub line_width: Option<StyleProperty<f32>>,
    #[serde(rename = "line-opacity", default)]
    pub line_opacity: Option<StyleProperty<f32>>,
    #[serde(rename = "line-dasharray", default)]
    pub line_dasharray: Option<StyleProperty<Vec<f32>>>,
    #[serde(rename = "line-cap", default)]
    pub line_cap: Option<StyleProperty<LineCap>>,
    #[serde(rename = "line-join", default)]
    pub line_join: Option<StyleProperty<LineJoin>>,
    #[serde(default)]
    pub visibility: Option<StyleProperty<Visibility>>,
}

/// Raster layers are parsed so that styles containing them load, but they are never drawn by
/// the vector renderer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RasterPaint {
    #[serde(rename = "raster-opacity", default)]
    pub raster_opacity: Option<StyleProperty<f32>>,
    #[serde(default)]
    pub visibility: Option<StyleProperty<Visibility>>,
}

/// Paint and layout properties of symbol layers. Both live in one struct as the renderer does not
/// care about the distinction.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SymbolPaint {
    #[serde(rename = "text-field", default)]
    pub text_field: Option<StyleProperty<String>>,
    #[serde(rename = "text-font", default)]
    pub text_font: Option<StyleProperty<Vec<String>>>,
    #[serde(rename = "text-size", default)]
    pub text_size: Option<StyleProperty<f32>>,
    #[serde(rename = "text-color", default)]
    pub text_color: Option<StyleProperty<Color>>,
    #[serde(rename = "text-opacity", default)]
    pub text_opacity: Option<StyleProperty<f32>>,
    #[serde(rename = "text-halo-color", default)]
    pub text_halo_color: Option<StyleProperty<Color>>,
    #[serde(rename = "text-halo-width", default)]
    pub text_halo_width: Option<StyleProperty<f32>>,
    #[serde(rename = "text-offset", default)]
    pub text_offset: Option<StyleProperty<[f32; 2]>>,
    #[serde(rename = "text-transform", default)]
    pub text_transform: Option<StyleProperty<TextTransform>>,
    #[serde(rename = "text-justify", default)]
    pub text_justify: Option<StyleProperty<TextJustify>>,
    #[serde(rename = "text-max-width", default)]
    pub text_max_width: Option<StyleProperty<f32>>,
    #[serde(rename = "icon-image", default)]
    pub icon_image: Option<StyleProperty<String>>,
    #[serde(rename = "icon-size", default)]
    pub icon_size: Option<StyleProperty<f32>>,
    #[serde(rename = "icon-opacity", default)]
    pub icon_opacity: Option<StyleProperty<f32>>,
    #[serde(default)]
    pub visibility: Option<StyleProperty<Visibility>>,
}

/// The different types of paints.
#[derive(Debug, Clone, Default)]
pub enum LayerPaint {
    Background(BackgroundPaint),
    Line(LinePaint),
    Fill(FillPaint),
    Raster(RasterPaint),
    Symbol(SymbolPaint),
    /// Unknown layer types, or paint which failed to parse.
    #[default]
    None,
}

impl LayerPaint {
    pub fn visibility(&self) -> Option<&StyleProperty<Visibility>> {
        match self {
            LayerPaint::Background(paint) => paint.visibility.as_ref(),
            LayerPaint::Line(paint) => paint.visibility.as_ref(),
            LayerPaint::Fill(paint) => paint.visibility.as_ref(),
            LayerPaint::Raster(paint) => paint.visibility.as_ref(),
            LayerPaint::Symbol(paint) => paint.visibility.as_ref(),
            LayerPaint::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleType {
    Background,
    Fill,
    Line,
    Symbol,
    Raster,
    Other(String),
}

impl From<String> for RuleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "background" => RuleType::Background,
            "fill" => RuleType::Fill,
            "line" => RuleType::Line,
            "symbol" => RuleType::Symbol,
            "raster" => RuleType::Raster,
            _ => RuleType::Other(value),
        }
    }
}

/// Stores all the styles for a specific layer.
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// Position of the rule in its style sheet.
    pub index: u32,
    pub id: String,
    pub type_: RuleType,
    pub source_layer: Option<String>,
    pub minzoom: Option<f64>,
    pub maxzoom: Option<f64>,
    /// Explicit draw order. Rules without one are ordered by `index`.
    pub z_index: Option<i32>,
    pub filter: Option<Filter>,
    pub paint: LayerPaint,
}

impl StyleRule {
    pub fn z_index(&self) -> i32 {
        self.z_index.unwrap_or(self.index as i32)
    }

    /// True if `zoom` lies in `[minzoom, maxzoom)`.
    pub fn in_zoom_range(&self, zoom: f64) -> bool {
        self.minzoom.map_or(true, |minzoom| zoom >= minzoom)
            && self.maxzoom.map_or(true, |maxzoom| zoom < maxzoom)
    }
}

#[derive(Deserialize)]
struct StyleRuleDef {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    maxzoom: Option<f64>,
    minzoom: Option<f64>,
    #[serde(rename = "z-index")]
    z_index: Option<i32>,
    #[serde(rename = "source-layer")]
    source_layer: Option<String>,
    filter: Option<Filter>,
    paint: Option<Map<String, Value>>,
    layout: Option<Map<String, Value>>,
}

fn parse_paint<T: for<'de> Deserialize<'de>>(id: &str, properties: Map<String, Value>) -> Option<T> {
    serde_json::from_value(Value::Object(properties))
        .map_err(|e| log::error!("paint of layer {} failed: {:?}", id, e))
        .ok()
}

impl<'de> serde::Deserialize<'de> for StyleRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let def = StyleRuleDef::deserialize(deserializer)?;

        // layout properties like visibility and text-field are merged with the paint
        let mut properties = def.layout.unwrap_or_default();
        properties.extend(def.paint.unwrap_or_default());

        let type_ = RuleType::from(def.type_);
        let paint = match &type_ {
            RuleType::Background => parse_paint(&def.id, properties).map(LayerPaint::Background),
            RuleType::Fill => parse_paint(&def.id, properties).map(LayerPaint::Fill),
            RuleType::Line => parse_paint(&def.id, properties).map(LayerPaint::Line),
            RuleType::Symbol => parse_paint(&def.id, properties).map(LayerPaint::Symbol),
            RuleType::Raster => parse_paint(&def.id, properties).map(LayerPaint::Raster),
            RuleType::Other(name) => {
                log::debug!("layer {} has unsupported type {}", def.id, name);
                None
            }
        }
        .unwrap_or_default();

        Ok(StyleRule {
            index: 0,
            id: def.id,
            type_,
            source_layer: def.source_layer,
            minzoom: def.minzoom,
            maxzoom: def.maxzoom,
            z_index: def.z_index,
            filter: def.filter,
            paint,
        })
    }
}

impl Eq for StyleRule {}
impl PartialEq for StyleRule {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl Hash for StyleRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
