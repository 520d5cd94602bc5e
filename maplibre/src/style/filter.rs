//! Feature filters of style rules.
//!
//! Both the legacy filter syntax (`["==", "class", "river"]`) and expression filters
//! (`["==", ["get", "class"], "river"]`) are accepted. Filters are parsed once when the style is
//! loaded.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::style::{
    expression::{compare_values, evaluate, is_expression, values_equal, EvaluationContext},
    StyleError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "==" => CompareOp::Equal,
            "!=" => CompareOp::NotEqual,
            "<" => CompareOp::Less,
            "<=" => CompareOp::LessOrEqual,
            ">" => CompareOp::Greater,
            ">=" => CompareOp::GreaterOrEqual,
            _ => return None,
        })
    }

    fn apply(self, actual: Option<&Value>, expected: &Value) -> bool {
        match self {
            CompareOp::Equal => actual.map_or(false, |actual| values_equal(actual, expected)),
            CompareOp::NotEqual => actual.map_or(true, |actual| !values_equal(actual, expected)),
            _ => {
                let Some(ordering) = actual.and_then(|actual| compare_values(actual, expected))
                else {
                    return false;
                };
                match self {
                    CompareOp::Less => ordering.is_lt(),
                    CompareOp::LessOrEqual => ordering.is_le(),
                    CompareOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        key: String,
        op: CompareOp,
        value: Value,
    },
    In {
        key: String,
        values: Vec<Value>,
        negate: bool,
    },
    Has {
        key: String,
        negate: bool,
    },
    All(Vec<Filter>),
    Any(Vec<Filter>),
    None(Vec<Filter>),
    /// Any filter in expression syntax. Matches if the expression evaluates to `true`.
    Expression(Value),
}

impl Filter {
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        match self {
            Filter::Compare { key, op, value } => op.apply(context.get(key).as_ref(), value),
            Filter::In {
                key,
                values,
                negate,
            } => {
                let found = context
                    .get(key)
                    .map_or(false, |actual| values.iter().any(|value| values_equal(&actual, value)));
                found != *negate
            }
            Filter::Has { key, negate } => context.get(key).is_some() != *negate,
            Filter::All(filters) => filters.iter().all(|filter| filter.matches(context)),
            Filter::Any(filters) => filters.iter().any(|filter| filter.matches(context)),
            Filter::None(filters) => !filters.iter().any(|filter| filter.matches(context)),
            Filter::Expression(expression) => evaluate(expression, context) == Value::Bool(true),
        }
    }
}

fn children(args: &[Value]) -> Result<Vec<Filter>, StyleError> {
    args.iter().cloned().map(Filter::try_from).collect()
}

fn legacy_key(args: &[Value]) -> Option<&str> {
    args.first().and_then(Value::as_str)
}

impl TryFrom<Value> for Filter {
    type Error = StyleError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let items = match value {
            Value::Bool(_) => return Ok(Filter::Expression(value)),
            Value::Array(items) => items,
            other => return Err(StyleError::InvalidFilter(other.to_string())),
        };

        let Some(op) = items.first().and_then(Value::as_str) else {
            return Err(StyleError::InvalidExpression(Value::Array(items).to_string()));
        };
        let args = &items[1..];

        if let Some(compare) = CompareOp::from_operator(op) {
            if let (Some(key), [_, value]) = (legacy_key(args), args) {
                return Ok(Filter::Compare {
                    key: key.to_string(),
                    op: compare,
                    value: value.clone(),
                });
            }
        }

        let filter = match op {
            "in" | "!in" if legacy_key(args).is_some() => Filter::In {
                key: legacy_key(args).unwrap_or_default().to_string(),
                values: args[1..].to_vec(),
                negate: op == "!in",
            },
            "has" | "!has" if args.len() == 1 && legacy_key(args).is_some() => Filter::Has {
                key: legacy_key(args).unwrap_or_default().to_string(),
                negate: op == "!has",
            },
            "all" => Filter::All(children(args)?),
            "any" => Filter::Any(children(args)?),
            "none" => Filter::None(children(args)?),
            _ => {
                let expression = Value::Array(items);
                if !is_expression(&expression) {
                    return Err(StyleError::InvalidFilter(expression.to_string()));
                }
                Filter::Expression(expression)
            }
        };

        Ok(filter)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Filter::try_from(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::tile::{GeometryType, PropertyValue};

    fn matches(filter: Value, geometry_type: GeometryType) -> bool {
        let mut properties = HashMap::new();
        properties.insert("class".to_string(), PropertyValue::from("river"));
        properties.insert("admin_level".to_string(), PropertyValue::from(2i64));

        let context = EvaluationContext::new(6.0)
            .with_feature(7, geometry_type, &properties)
            .with_layer("waterway");
        Filter::try_from(filter).unwrap().matches(&context)
    }

    #[test]
    fn test_legacy_filters() {
        assert!(matches(json!(["==", "class", "river"]), GeometryType::LineString));
        assert!(!matches(json!(["!=", "class", "river"]), GeometryType::LineString));
        assert!(matches(json!(["<=", "admin_level", 2]), GeometryType::LineString));
        assert!(matches(json!(["in", "class", "canal", "river"]), GeometryType::LineString));
        assert!(matches(json!(["!in", "class", "canal"]), GeometryType::LineString));
        assert!(matches(json!(["has", "class"]), GeometryType::LineString));
        assert!(matches(json!(["!has", "name"]), GeometryType::LineString));
    }

    #[test]
    fn test_synthetic_keys() {
        assert!(matches(json!(["==", "$type", "Polygon"]), GeometryType::Polygon));
        assert!(!matches(json!(["==", "$type", "Polygon"]), GeometryType::Point));
        assert!(matches(json!(["==", "$id", 7]), GeometryType::Point));
        assert!(matches(json!(["==", "$layer", "waterway"]), GeometryType::Point));
        assert!(matches(json!([">=", "$zoom", 5]), GeometryType::Point));
    }

    #[test]
    fn test_combinators() {
        let filter = json!([
            "all",
            ["==", "$type", "LineString"],
            ["any", ["==", "class", "canal"], ["==", "class", "river"]],
            ["none", ["==", "admin_level", 4]]
        ]);
        assert!(matches(filter.clone(), GeometryType::LineString));
        assert!(!matches(filter, GeometryType::Polygon));
    }

    #[test]
    fn test_expression_filters() {
        assert!(matches(
            json!(["==", ["get", "class"], "river"]),
            GeometryType::LineString
        ));
        assert!(matches(
            json!(["!", ["has", "name"]]),
            GeometryType::LineString
        ));
        assert!(matches(
            json!(["all", ["==", ["geometry-type"], "Point"], ["<", ["zoom"], 8]]),
            GeometryType::Point
        ));
        assert!(!matches(json!(false), GeometryType::Point));
    }

    #[test]
    fn test_invalid_filters() {
        assert!(matches!(
            Filter::try_from(json!("class")),
            Err(StyleError::InvalidFilter(_))
        ));
        assert!(matches!(
            Filter::try_from(json!([1, 2])),
            Err(StyleError::InvalidExpression(_))
        ));
        assert!(matches!(
            Filter::try_from(json!(["frobnicate", "class"])),
            Err(StyleError::InvalidFilter(_))
        ));
    }
}
