//! Evaluation of style property values.
//!
//! Values are either constants or expressions in the JSON array syntax of the MapLibre style
//! specification. Legacy `{"stops": ..}` functions and `"{field}"` text templates are supported as
//! well. Evaluation never fails hard: anything that can not be evaluated becomes `null`, which
//! callers treat as "use the default".

use std::{collections::HashMap, fmt::Debug};

use csscolorparser::Color;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::tile::{FeatureId, GeometryType, PropertyValue};

const OPERATORS: &[&str] = &[
    "get",
    "has",
    "literal",
    "zoom",
    "geometry-type",
    "id",
    "match",
    "case",
    "coalesce",
    "step",
    "interpolate",
    "==",
    "!=",
    "<",
    "<=",
    ">",
    ">=",
    "all",
    "any",
    "!",
    "to-string",
    "to-number",
    "to-boolean",
    "string",
    "number",
    "boolean",
    "concat",
    "upcase",
    "downcase",
    "+",
    "-",
    "*",
    "/",
];

/// Everything an expression can read.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub properties: Option<&'a HashMap<String, PropertyValue>>,
    pub zoom: f64,
    pub geometry_type: GeometryType,
    pub feature_id: Option<FeatureId>,
    /// Id of the style rule which is evaluated.
    pub layer_id: &'a str,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(zoom: f64) -> Self {
        Self {
            properties: None,
            zoom,
            geometry_type: GeometryType::Unknown,
            feature_id: None,
            layer_id: "",
        }
    }

    pub fn with_feature(
        mut self,
        feature_id: FeatureId,
        geometry_type: GeometryType,
        properties: &'a HashMap<String, PropertyValue>,
    ) -> Self {
        self.feature_id = Some(feature_id);
        self.geometry_type = geometry_type;
        self.properties = Some(properties);
        self
    }

    pub fn with_layer(mut self, layer_id: &'a str) -> Self {
        self.layer_id = layer_id;
        self
    }

    /// Looks up a feature attribute. The synthetic keys `$type`, `$id`, `$layer` and `$zoom`
    /// resolve to the geometry type, feature id, rule id and effective zoom.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "$type" => Some(Value::String(self.geometry_type.as_str().to_string())),
            "$id" => self.feature_id.map(Value::from),
            "$layer" => Some(Value::String(self.layer_id.to_string())),
            "$zoom" => Number::from_f64(self.zoom).map(Value::Number),
            _ => self
                .properties
                .and_then(|properties| properties.get(key))
                .map(PropertyValue::to_json),
        }
    }
}

/// Conversion of an evaluated JSON value into a concrete paint value.
pub trait FromStyleValue: Sized {
    fn from_style_value(value: &Value) -> Option<Self>;
}

impl FromStyleValue for f64 {
    fn from_style_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64(),
            Value::String(string) => string.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromStyleValue for f32 {
    fn from_style_value(value: &Value) -> Option<Self> {
        f64::from_style_value(value).map(|value| value as f32)
    }
}

impl FromStyleValue for bool {
    fn from_style_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromStyleValue for String {
    fn from_style_value(value: &Value) -> Option<Self> {
        to_string(value)
    }
}

impl FromStyleValue for Color {
    fn from_style_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|string| csscolorparser::parse(string).ok())
    }
}

impl FromStyleValue for Vec<f32> {
    fn from_style_value(value: &Value) -> Option<Self> {
        value
            .as_array()?
            .iter()
            .map(f32::from_style_value)
            .collect()
    }
}

impl FromStyleValue for Vec<String> {
    fn from_style_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(string) => Some(vec![string.clone()]),
            Value::Array(items) => items.iter().map(|item| item.as_str().map(str::to_string)).collect(),
            _ => None,
        }
    }
}

impl FromStyleValue for [f32; 2] {
    fn from_style_value(value: &Value) -> Option<Self> {
        match Vec::<f32>::from_style_value(value)?.as_slice() {
            [x, y] => Some([*x, *y]),
            _ => None,
        }
    }
}

/// Implements [`FromStyleValue`] for keyword enums which implement [`FromStr`].
macro_rules! keyword_style_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::style::expression::FromStyleValue for $ty {
                fn from_style_value(value: &serde_json::Value) -> Option<Self> {
                    value
                        .as_str()
                        .and_then(|string| <$ty as std::str::FromStr>::from_str(string).ok())
                }
            }
        )*
    };
}

pub(crate) use keyword_style_value;

/// A paint or layout property. Either a constant or an expression over the feature and zoom.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleProperty<T> {
    Constant(T),
    Expression(Value),
}

impl<T: FromStyleValue + Clone> StyleProperty<T> {
    /// Returns `None` if the value is neither an expression nor a valid constant.
    pub fn from_value(value: Value) -> Option<Self> {
        if is_expression(&value) {
            return Some(StyleProperty::Expression(value));
        }
        T::from_style_value(&value).map(StyleProperty::Constant)
    }

    pub fn evaluate(&self, context: &EvaluationContext) -> Option<T> {
        match self {
            StyleProperty::Constant(value) => Some(value.clone()),
            StyleProperty::Expression(expression) => {
                T::from_style_value(&evaluate(expression, context))
            }
        }
    }
}

impl<'de, T: FromStyleValue + Clone> Deserialize<'de> for StyleProperty<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        StyleProperty::from_value(value.clone()).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported property value {value}"))
        })
    }
}

pub fn is_expression(value: &Value) -> bool {
    match value {
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .map_or(false, |op| OPERATORS.contains(&op)),
        Value::Object(object) => object.contains_key("stops"),
        Value::String(string) => is_template(string),
        _ => false,
    }
}

fn is_template(string: &str) -> bool {
    string
        .find('{')
        .map_or(false, |open| string[open..].contains('}'))
}

/// Replaces every `{field}` with the attribute value of the feature. Missing attributes become
/// empty strings.
fn expand_template(template: &str, context: &EvaluationContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => {
                let key = &rest[open + 1..open + close];
                if let Some(value) = context.get(key).as_ref().and_then(to_string) {
                    result.push_str(&value);
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    f64::from_style_value(value)
}

fn number(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(boolean) => *boolean,
        Value::Null => false,
        Value::Number(number) => number.as_f64().map_or(false, |number| number != 0.0),
        Value::String(string) => !string.is_empty(),
        _ => true,
    }
}

/// Equality with numbers compared by value, so that `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// Ordering of numbers and of strings. Values of different kinds are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluates `expression` against `context`. Returns [`Value::Null`] for anything which can not
/// be evaluated.
pub fn evaluate(expression: &Value, context: &EvaluationContext) -> Value {
    match expression {
        Value::Array(items) => match items.first().and_then(Value::as_str) {
            Some(op) if OPERATORS.contains(&op) => evaluate_operator(op, &items[1..], context),
            _ => expression.clone(),
        },
        Value::Object(object) if object.contains_key("stops") => {
            evaluate_legacy_function(object, context)
        }
        Value::String(string) if is_template(string) => {
            Value::String(expand_template(string, context))
        }
        _ => expression.clone(),
    }
}

fn evaluate_operator(op: &str, args: &[Value], context: &EvaluationContext) -> Value {
    let arg = |index: usize| {
        args.get(index)
            .map(|value| evaluate(value, context))
            .unwrap_or(Value::Null)
    };

    match op {
        "get" => arg(0)
            .as_str()
            .and_then(|key| context.get(key))
            .unwrap_or(Value::Null),
        "has" => Value::Bool(arg(0).as_str().and_then(|key| context.get(key)).is_some()),
        "literal" => args.first().cloned().unwrap_or(Value::Null),
        "zoom" => number(context.zoom),
        "geometry-type" => Value::String(context.geometry_type.as_str().to_string()),
        "id" => context.feature_id.map(Value::from).unwrap_or(Value::Null),
        "match" => evaluate_match(args, context),
        "case" => {
            let mut pairs = args.chunks_exact(2);
            for pair in &mut pairs {
                if is_truthy(&evaluate(&pair[0], context)) {
                    return evaluate(&pair[1], context);
                }
            }
            pairs
                .remainder()
                .first()
                .map(|fallback| evaluate(fallback, context))
                .unwrap_or(Value::Null)
        }
        "coalesce" => args
            .iter()
            .map(|value| evaluate(value, context))
            .find(|value| !value.is_null())
            .unwrap_or(Value::Null),
        "step" => evaluate_step(args, context),
        "interpolate" => evaluate_interpolate(args, context),
        "==" => Value::Bool(values_equal(&arg(0), &arg(1))),
        "!=" => Value::Bool(!values_equal(&arg(0), &arg(1))),
        "<" | "<=" | ">" | ">=" => {
            let ordering = compare_values(&arg(0), &arg(1));
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                ("<", Some(ordering)) => ordering.is_lt(),
                ("<=", Some(ordering)) => ordering.is_le(),
                (">", Some(ordering)) => ordering.is_gt(),
                (_, Some(ordering)) => ordering.is_ge(),
            })
        }
        "all" => Value::Bool(args.iter().all(|value| is_truthy(&evaluate(value, context)))),
        "any" => Value::Bool(args.iter().any(|value| is_truthy(&evaluate(value, context)))),
        "!" => Value::Bool(!is_truthy(&arg(0))),
        "to-string" | "string" => to_string(&arg(0)).map(Value::String).unwrap_or(Value::Null),
        "to-number" | "number" => to_number(&arg(0)).map(number).unwrap_or(Value::Null),
        "to-boolean" | "boolean" => Value::Bool(is_truthy(&arg(0))),
        "concat" => Value::String(
            args.iter()
                .filter_map(|value| to_string(&evaluate(value, context)))
                .collect(),
        ),
        "upcase" => to_string(&arg(0))
            .map(|string| Value::String(string.to_uppercase()))
            .unwrap_or(Value::Null),
        "downcase" => to_string(&arg(0))
            .map(|string| Value::String(string.to_lowercase()))
            .unwrap_or(Value::Null),
        "+" | "*" => {
            let values: Option<Vec<f64>> = args
                .iter()
                .map(|value| to_number(&evaluate(value, context)))
                .collect();
            match values {
                Some(values) if op == "+" => number(values.iter().sum()),
                Some(values) => number(values.iter().product()),
                None => Value::Null,
            }
        }
        "-" => match (to_number(&arg(0)), args.len()) {
            (Some(a), 1) => number(-a),
            (Some(a), _) => to_number(&arg(1)).map(|b| number(a - b)).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "/" => match (to_number(&arg(0)), to_number(&arg(1))) {
            (Some(a), Some(b)) if b != 0.0 => number(a / b),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

/// `["match", input, label, output, ..., fallback]`. Labels can be single values or arrays.
fn evaluate_match(args: &[Value], context: &EvaluationContext) -> Value {
    let Some(input) = args.first().map(|value| evaluate(value, context)) else {
        return Value::Null;
    };

    let mut cases = args[1..].chunks_exact(2);
    for case in &mut cases {
        let matches = match &case[0] {
            Value::Array(labels) => labels.iter().any(|label| values_equal(label, &input)),
            label => values_equal(label, &input),
        };
        if matches {
            return evaluate(&case[1], context);
        }
    }

    cases
        .remainder()
        .first()
        .map(|fallback| evaluate(fallback, context))
        .unwrap_or(Value::Null)
}

/// `["step", input, output_0, stop_1, output_1, ...]`
fn evaluate_step(args: &[Value], context: &EvaluationContext) -> Value {
    let Some(input) = args.first().and_then(|value| to_number(&evaluate(value, context))) else {
        return Value::Null;
    };
    let Some(mut output) = args.get(1) else {
        return Value::Null;
    };

    for stop in args[2..].chunks_exact(2) {
        match to_number(&evaluate(&stop[0], context)) {
            Some(threshold) if input >= threshold => output = &stop[1],
            _ => break,
        }
    }

    evaluate(output, context)
}

/// `["interpolate", ["linear"] | ["exponential", base], input, stop_1, output_1, ...]`
fn evaluate_interpolate(args: &[Value], context: &EvaluationContext) -> Value {
    let base = match args.first().and_then(Value::as_array).map(Vec::as_slice) {
        Some([kind, base]) if kind.as_str() == Some("exponential") => base.as_f64().unwrap_or(1.0),
        _ => 1.0,
    };
    let Some(input) = args.get(1).and_then(|value| to_number(&evaluate(value, context))) else {
        return Value::Null;
    };

    let stops: Vec<(f64, Value)> = args
        .get(2..)
        .unwrap_or_default()
        .chunks_exact(2)
        .filter_map(|stop| {
            to_number(&evaluate(&stop[0], context)).map(|at| (at, evaluate(&stop[1], context)))
        })
        .collect();

    interpolate_stops(&stops, input, base)
}

fn interpolate_stops(stops: &[(f64, Value)], input: f64, base: f64) -> Value {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Value::Null;
    };
    if input <= first.0 {
        return first.1.clone();
    }
    if input >= last.0 {
        return last.1.clone();
    }

    for window in stops.windows(2) {
        let ((lower, lower_value), (upper, upper_value)) = (&window[0], &window[1]);
        if input >= *lower && input < *upper {
            let t = interpolation_factor(input, *lower, *upper, base);
            return interpolate_values(lower_value, upper_value, t);
        }
    }

    last.1.clone()
}

fn interpolation_factor(input: f64, lower: f64, upper: f64, base: f64) -> f64 {
    let range = upper - lower;
    if range <= 0.0 {
        return 0.0;
    }
    let progress = input - lower;
    if (base - 1.0).abs() < f64::EPSILON {
        progress / range
    } else {
        (base.powf(progress) - 1.0) / (base.powf(range) - 1.0)
    }
}

fn interpolate_values(a: &Value, b: &Value, t: f64) -> Value {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => number(a + (b - a) * t),
            _ => Value::Null,
        },
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            Value::Array(a.iter().zip(b).map(|(a, b)| interpolate_values(a, b, t)).collect())
        }
        (Value::String(a), Value::String(b)) => {
            match (csscolorparser::parse(a), csscolorparser::parse(b)) {
                (Ok(a), Ok(b)) => {
                    let (a, b) = (a.to_rgba8(), b.to_rgba8());
                    let channel =
                        |i: usize| a[i] as f64 + (b[i] as f64 - a[i] as f64) * t;
                    Value::String(format!(
                        "rgba({}, {}, {}, {})",
                        channel(0).round(),
                        channel(1).round(),
                        channel(2).round(),
                        channel(3) / 255.0
                    ))
                }
                _ => Value::String(a.clone()),
            }
        }
        _ => a.clone(),
    }
}

/// Legacy `{"stops": [[input, output], ...], "base": .., "property": .., "type": ..}` functions.
fn evaluate_legacy_function(
    function: &serde_json::Map<String, Value>,
    context: &EvaluationContext,
) -> Value {
    let input = match function.get("property").and_then(Value::as_str) {
        Some(property) => context.get(property).unwrap_or(Value::Null),
        None => number(context.zoom),
    };
    let base = function.get("base").and_then(Value::as_f64).unwrap_or(1.0);

    let stops: Vec<(Value, Value)> = function
        .get("stops")
        .and_then(Value::as_array)
        .map(|stops| {
            stops
                .iter()
                .filter_map(|stop| match stop.as_array().map(Vec::as_slice) {
                    Some([at, output]) => Some((at.clone(), evaluate(output, context))),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let kind = function.get("type").and_then(Value::as_str);
    match kind {
        Some("categorical") => stops
            .iter()
            .find(|(at, _)| values_equal(at, &input))
            .map(|(_, output)| output.clone())
            .or_else(|| function.get("default").cloned())
            .unwrap_or(Value::Null),
        Some("interval") => interval_stops(&stops, &input),
        _ => {
            let Some(input) = to_number(&input) else {
                return function.get("default").cloned().unwrap_or(Value::Null);
            };
            let numeric: Vec<(f64, Value)> = stops
                .iter()
                .filter_map(|(at, output)| to_number(at).map(|at| (at, output.clone())))
                .collect();
            let interpolatable = numeric.iter().all(|(_, output)| {
                output.is_number() || output.is_array() || Color::from_style_value(output).is_some()
            });
            if kind.is_none() && !interpolatable {
                interval_stops(&stops, &number(input))
            } else {
                interpolate_stops(&numeric, input, base)
            }
        }
    }
}

fn interval_stops(stops: &[(Value, Value)], input: &Value) -> Value {
    let Some(input) = to_number(input) else {
        return Value::Null;
    };
    let mut output = stops.first().map(|(_, output)| output);
    for (at, value) in stops {
        match to_number(at) {
            Some(at) if input >= at => output = Some(value),
            _ => break,
        }
    }
    output.cloned().unwrap_or(Value::Null)
}

impl<T: Debug> StyleProperty<T> {
    pub fn is_constant(&self) -> bool {
        matches!(self, StyleProperty::Constant(_))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn properties() -> HashMap<String, PropertyValue> {
        let mut properties = HashMap::new();
        properties.insert("ADM0_A3".to_string(), PropertyValue::from("ARM"));
        properties.insert("name".to_string(), PropertyValue::from("Yerevan"));
        properties.insert("rank".to_string(), PropertyValue::from(3i64));
        properties
    }

    fn evaluate_with(expression: Value, zoom: f64) -> Value {
        let properties = properties();
        let context = EvaluationContext::new(zoom).with_feature(
            1,
            GeometryType::Point,
            &properties,
        );
        evaluate(&expression, &context)
    }

    #[test]
    fn test_evaluate_match() {
        let prop: StyleProperty<Color> = StyleProperty::from_value(json!([
            "match",
            ["get", "ADM0_A3"],
            ["ARM", "ATG"],
            "rgba(1, 2, 3, 1)",
            "rgba(0, 0, 0, 1)"
        ]))
        .unwrap();

        let properties = properties();
        let context = EvaluationContext::new(0.0).with_feature(1, GeometryType::Polygon, &properties);
        assert_eq!(prop.evaluate(&context).unwrap().to_rgba8(), [1, 2, 3, 255]);
    }

    #[test]
    fn test_evaluate_match_missing_property_returns_fallback() {
        let prop: StyleProperty<Color> = StyleProperty::from_value(json!([
            "match",
            ["get", "ISO"],
            ["ARM", "ATG"],
            "rgba(1, 2, 3, 1)",
            "rgba(9, 9, 9, 1)"
        ]))
        .unwrap();

        let context = EvaluationContext::new(0.0);
        assert_eq!(prop.evaluate(&context).unwrap().to_rgba8(), [9, 9, 9, 255]);
    }

    #[test]
    fn test_constants_and_literal_arrays() {
        assert_eq!(
            StyleProperty::<f32>::from_value(json!(2.5)),
            Some(StyleProperty::Constant(2.5))
        );
        assert_eq!(
            StyleProperty::<Vec<f32>>::from_value(json!([2, 1])),
            Some(StyleProperty::Constant(vec![2.0, 1.0]))
        );
        assert_eq!(
            StyleProperty::<Vec<String>>::from_value(json!(["Open Sans Regular"])),
            Some(StyleProperty::Constant(vec!["Open Sans Regular".to_string()]))
        );
        assert!(StyleProperty::<f32>::from_value(json!("wide")).is_none());
    }

    #[test]
    fn test_text_template() {
        let prop: StyleProperty<String> = StyleProperty::from_value(json!("{name} ({rank})")).unwrap();
        assert!(!prop.is_constant());

        let properties = properties();
        let context = EvaluationContext::new(0.0).with_feature(1, GeometryType::Point, &properties);
        assert_eq!(prop.evaluate(&context).unwrap(), "Yerevan (3)");
    }

    #[test]
    fn test_interpolate_zoom() {
        let expression = json!(["interpolate", ["linear"], ["zoom"], 10, 1, 20, 11]);
        assert_eq!(evaluate_with(expression.clone(), 5.0), json!(1));
        assert_eq!(evaluate_with(expression.clone(), 15.0).as_f64(), Some(6.0));
        assert_eq!(evaluate_with(expression, 25.0), json!(11));
    }

    #[test]
    fn test_interpolate_colors() {
        let expression = json!([
            "interpolate",
            ["linear"],
            ["zoom"],
            0,
            "rgb(0, 0, 0)",
            10,
            "rgb(200, 100, 0)"
        ]);
        let color = Color::from_style_value(&evaluate_with(expression, 5.0)).unwrap();
        assert_eq!(color.to_rgba8(), [100, 50, 0, 255]);
    }

    #[test]
    fn test_step() {
        let expression = json!(["step", ["get", "rank"], "small", 2, "medium", 5, "large"]);
        assert_eq!(evaluate_with(expression, 0.0), json!("medium"));
    }

    #[test]
    fn test_legacy_stops() {
        let expression = json!({"base": 1.0, "stops": [[4, 1], [8, 5]]});
        assert_eq!(evaluate_with(expression.clone(), 6.0).as_f64(), Some(3.0));

        let text = json!({"stops": [[2, "{ADM0_A3}"], [4, "{name}"]]});
        assert_eq!(evaluate_with(text.clone(), 3.0), json!("ARM"));
        assert_eq!(evaluate_with(text, 5.0), json!("Yerevan"));
    }

    #[test]
    fn test_case_and_coalesce() {
        let expression = json!([
            "case",
            [">", ["get", "rank"], 5],
            "big",
            ["==", ["geometry-type"], "Point"],
            "point",
            "other"
        ]);
        assert_eq!(evaluate_with(expression, 0.0), json!("point"));

        let expression = json!(["coalesce", ["get", "name:en"], ["get", "name"]]);
        assert_eq!(evaluate_with(expression, 0.0), json!("Yerevan"));
    }

    #[test]
    fn test_synthetic_keys() {
        let properties = properties();
        let context = EvaluationContext::new(7.5)
            .with_feature(42, GeometryType::LineString, &properties)
            .with_layer("roads");

        assert_eq!(context.get("$type"), Some(json!("LineString")));
        assert_eq!(context.get("$id"), Some(json!(42)));
        assert_eq!(context.get("$layer"), Some(json!("roads")));
        assert_eq!(context.get("$zoom").and_then(|zoom| zoom.as_f64()), Some(7.5));
    }
}
