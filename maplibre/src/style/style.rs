//! Style sheets: an ordered list of style rules.

use std::{fs, path::Path};

use csscolorparser::Color;
use serde::Deserialize;
use serde_json::Value;

use crate::style::{
    expression::StyleProperty,
    filter::{CompareOp, Filter},
    layer::{BackgroundPaint, FillPaint, LayerPaint, LinePaint, RuleType, StyleRule, SymbolPaint},
    StyleError,
};

/// Stores the style for a multi-layered map.
#[derive(Deserialize, Debug, Clone)]
pub struct StyleSheet {
    #[serde(default = "default_version")]
    pub version: u16,
    #[serde(default)]
    pub name: String,
    pub layers: Vec<StyleRule>,
}

fn default_version() -> u16 {
    8
}

impl StyleSheet {
    pub fn new(name: impl Into<String>, layers: Vec<StyleRule>) -> Self {
        let mut sheet = Self {
            version: default_version(),
            name: name.into(),
            layers,
        };
        sheet.assign_indices();
        sheet
    }

    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        let mut sheet: StyleSheet = serde_json::from_str(json)?;
        sheet.assign_indices();
        Ok(sheet)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StyleError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn rule(&self, id: &str) -> Option<&StyleRule> {
        self.layers.iter().find(|rule| rule.id == id)
    }

    fn assign_indices(&mut self) {
        for (index, rule) in self.layers.iter_mut().enumerate() {
            rule.index = index as u32;
        }
    }
}

fn rule(id: &str, type_: RuleType, source_layer: Option<&str>, paint: LayerPaint) -> StyleRule {
    StyleRule {
        index: 0,
        id: id.to_string(),
        type_,
        source_layer: source_layer.map(str::to_string),
        minzoom: None,
        maxzoom: None,
        z_index: None,
        filter: None,
        paint,
    }
}

fn color(r: u8, g: u8, b: u8) -> Option<StyleProperty<Color>> {
    Some(StyleProperty::Constant(Color::from_rgba8(r, g, b, 255)))
}

impl Default for StyleSheet {
    fn default() -> Self {
        let mut labels = rule(
            "place-labels",
            RuleType::Symbol,
            Some("place"),
            LayerPaint::Symbol(SymbolPaint {
                text_field: Some(StyleProperty::Expression(Value::String("{name}".to_string()))),
                text_size: Some(StyleProperty::Constant(14.0)),
                text_color: color(51, 51, 51),
                text_halo_color: color(255, 255, 255),
                text_halo_width: Some(StyleProperty::Constant(1.0)),
                ..Default::default()
            }),
        );
        labels.filter = Some(Filter::Compare {
            key: "$type".to_string(),
            op: CompareOp::Equal,
            value: Value::String("Point".to_string()),
        });

        StyleSheet::new(
            "Default Style",
            vec![
                rule(
                    "background",
                    RuleType::Background,
                    None,
                    LayerPaint::Background(BackgroundPaint {
                        background_color: color(239, 239, 239),
                        ..Default::default()
                    }),
                ),
                rule(
                    "water",
                    RuleType::Fill,
                    Some("water"),
                    LayerPaint::Fill(FillPaint {
                        fill_color: color(170, 211, 223),
                        ..Default::default()
                    }),
                ),
                rule(
                    "landuse",
                    RuleType::Fill,
                    Some("landuse"),
                    LayerPaint::Fill(FillPaint {
                        fill_color: color(224, 223, 223),
                        ..Default::default()
                    }),
                ),
                rule(
                    "roads",
                    RuleType::Line,
                    Some("transportation"),
                    LayerPaint::Line(LinePaint {
                        line_color: color(255, 255, 255),
                        line_width: Some(StyleProperty::Constant(2.0)),
                        ..Default::default()
                    }),
                ),
                labels,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading() {
        // language=JSON
        let style_json_str = r##"
        {
          "version": 8,
          "name": "Test Style",
          "metadata": {},
          "sources": {
            "openmaptiles": {
              "type": "vector",
              "url": "https://maps.tuerantuer.org/europe_germany/tiles.json"
            }
          },
          "layers": [
            {
              "id": "background",
              "type": "background",
              "paint": {"background-color": "rgb(239,239,239)"}
            },
            {
              "id": "transportation",
              "type": "line",
              "source": "openmaptiles",
              "source-layer": "transportation",
              "paint": {
                "line-color": "#3D3D3D"
              }
            },
            {
              "id": "building",
              "minzoom": 14,
              "maxzoom": 15,
              "type": "fill",
              "source": "openmaptiles",
              "source-layer": "building",
              "paint": {
                "fill-color": "#3D3D3D"
              }
            }
          ]
        }
        "##;

        let style = StyleSheet::from_json(style_json_str).unwrap();
        assert_eq!(style.name, "Test Style");
        assert_eq!(style.layers.len(), 3);
        assert_eq!(
            style.layers.iter().map(|rule| rule.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(style.rule("building").map(|rule| rule.z_index()), Some(2));
        assert!(matches!(style.layers[0].paint, LayerPaint::Background(_)));
    }

    #[test]
    fn default_object() {
        let style = StyleSheet::default();
        assert_eq!(style.layers.first().map(|rule| &rule.type_), Some(&RuleType::Background));
        assert_eq!(style.rule("place-labels").map(|rule| rule.index), Some(4));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StyleSheet::from_json("{\"layers\": 3}"),
            Err(StyleError::Json(_))
        ));
        assert!(matches!(
            StyleSheet::load("/does/not/exist.json"),
            Err(StyleError::Io(_))
        ));
    }
}
