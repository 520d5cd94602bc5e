//! In-memory model of a decoded vector tile.
//!
//! Tiles are produced by the fetch pipeline with their geometry already transformed into the
//! pixel space of the requested raster. The renderer only reads them.

use std::{
    collections::HashMap,
    fmt,
    fmt::{Display, Formatter},
};

use geo_types::Coord;
use serde::{Deserialize, Serialize};

pub type FeatureId = u64;

/// One ring, line or point cluster of a geometry, in tile pixel space.
pub type Part = Vec<Coord<f32>>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    Unknown,
}

impl GeometryType {
    /// Name as used by the `$type` filter key and the `geometry-type` expression.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::Unknown => "Unknown",
        }
    }
}

/// Multi-part geometry of a feature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "parts")]
pub enum TileGeometry {
    Point(Vec<Part>),
    LineString(Vec<Part>),
    Polygon(Vec<Part>),
    Unknown(Vec<Part>),
}

impl TileGeometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            TileGeometry::Point(_) => GeometryType::Point,
            TileGeometry::LineString(_) => GeometryType::LineString,
            TileGeometry::Polygon(_) => GeometryType::Polygon,
            TileGeometry::Unknown(_) => GeometryType::Unknown,
        }
    }

    pub fn parts(&self) -> &[Part] {
        match self {
            TileGeometry::Point(parts)
            | TileGeometry::LineString(parts)
            | TileGeometry::Polygon(parts)
            | TileGeometry::Unknown(parts) => parts,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(value) => Some(*value as f64),
            PropertyValue::Float(value) => Some(*value),
            PropertyValue::String(value) => value.parse().ok(),
            PropertyValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Bool(value) => serde_json::Value::Bool(*value),
            PropertyValue::Int(value) => serde_json::Value::from(*value),
            PropertyValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::String(value) => serde_json::Value::String(value.clone()),
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::Float(value) => write!(f, "{value}"),
            PropertyValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: FeatureId,
    pub geometry: TileGeometry,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl TileFeature {
    pub fn new(id: FeatureId, geometry: TileGeometry) -> Self {
        Self {
            id,
            geometry,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    #[serde(default)]
    pub features: Vec<TileFeature>,
}

impl TileLayer {
    pub fn new(name: &str, features: Vec<TileFeature>) -> Self {
        Self {
            name: name.to_string(),
            features,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VectorTile {
    pub layers: Vec<TileLayer>,
}

impl VectorTile {
    pub fn new(layers: Vec<TileLayer>) -> Self {
        Self { layers }
    }

    /// Groups the layers by name. Tiles merged from several sources can carry the same layer
    /// name more than once; the tile order is preserved within each group.
    pub fn layers_by_name(&self) -> HashMap<&str, Vec<&TileLayer>> {
        group_layers_by_name(&self.layers)
    }
}

pub(crate) fn group_layers_by_name(layers: &[TileLayer]) -> HashMap<&str, Vec<&TileLayer>> {
    let mut grouped: HashMap<&str, Vec<&TileLayer>> = HashMap::new();
    for layer in layers {
        grouped.entry(layer.name.as_str()).or_default().push(layer);
    }
    grouped
}
