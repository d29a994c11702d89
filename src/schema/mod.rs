//! Declarative value shapes and the validator that enforces them
//!
//! A `Schema` is used twice: to check data crossing a flow boundary
//! (caller input, model output, tool I/O) and to tell the model which
//! shape it must produce (see `render`).

use crate::error::FlowError;
use crate::models::MediaRef;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// `data:<mime>;base64,<payload>`
    DataUri,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String(StringRules),
    Number { minimum: Option<f64> },
    Integer,
    Boolean,
    Enum(Vec<String>),
    Object(Vec<Field>),
    Array {
        items: Box<Schema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    /// Free-form string keys mapping to one value shape
    Record(Box<Schema>),
    /// Object field that may be absent
    Optional(Box<Schema>),
    Nullable(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        !matches!(self.schema, Schema::Optional(_))
    }
}

impl Schema {
    pub fn string() -> Self {
        Schema::String(StringRules::default())
    }

    pub fn non_empty_string() -> Self {
        Schema::String(StringRules {
            min_length: Some(1),
            format: None,
        })
    }

    pub fn data_uri() -> Self {
        Schema::String(StringRules {
            min_length: None,
            format: Some(StringFormat::DataUri),
        })
    }

    pub fn number() -> Self {
        Schema::Number { minimum: None }
    }

    pub fn number_min(minimum: f64) -> Self {
        Schema::Number {
            minimum: Some(minimum),
        }
    }

    pub fn integer() -> Self {
        Schema::Integer
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn enumeration(variants: &[&str]) -> Self {
        Schema::Enum(variants.iter().map(|v| v.to_string()).collect())
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Schema::Object(fields)
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn array_bounded(items: Schema, min_items: Option<usize>, max_items: Option<usize>) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items,
            max_items,
        }
    }

    pub fn record(values: Schema) -> Self {
        Schema::Record(Box::new(values))
    }

    pub fn optional(self) -> Self {
        Schema::Optional(Box::new(self))
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable(Box::new(self))
    }

    /// Short human name used in violation messages
    pub fn expected(&self) -> String {
        match self {
            Schema::String(rules) => match (rules.format, rules.min_length) {
                (Some(StringFormat::DataUri), _) => "data URI string".to_string(),
                (None, Some(n)) if n > 0 => format!("string of at least {} chars", n),
                _ => "string".to_string(),
            },
            Schema::Number { minimum: Some(min) } => format!("number >= {}", min),
            Schema::Number { minimum: None } => "number".to_string(),
            Schema::Integer => "integer".to_string(),
            Schema::Boolean => "boolean".to_string(),
            Schema::Enum(variants) => format!("one of [{}]", variants.join(", ")),
            Schema::Object(_) => "object".to_string(),
            Schema::Array { .. } => "array".to_string(),
            Schema::Record(_) => "object map".to_string(),
            Schema::Optional(inner) => inner.expected(),
            Schema::Nullable(inner) => format!("{} or null", inner.expected()),
        }
    }
}

/// Validate `value` against `schema`, returning the re-typed value.
pub fn validate(schema: &Schema, value: &Value) -> Result<Value> {
    validate_at(schema, value, "$")
}

/// Validate and then deserialize into a typed value.
pub fn validate_into<T: DeserializeOwned>(schema: &Schema, value: &Value) -> Result<T> {
    let validated = validate(schema, value)?;
    serde_json::from_value(validated)
        .map_err(|e| FlowError::schema("$", "value matching declared type", e.to_string()))
}

/// Serialize a typed value and validate the result.
pub fn validate_typed<T: Serialize>(schema: &Schema, value: &T) -> Result<Value> {
    let raw = serde_json::to_value(value)
        .map_err(|e| FlowError::schema("$", "serializable value", e.to_string()))?;
    validate(schema, &raw)
}

fn validate_at(schema: &Schema, value: &Value, path: &str) -> Result<Value> {
    match schema {
        Schema::Optional(inner) => validate_at(inner, value, path),

        Schema::Nullable(inner) => {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                validate_at(inner, value, path)
            }
        }

        Schema::String(rules) => {
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(path, schema, value))?;

            if let Some(min) = rules.min_length {
                if s.trim().chars().count() < min {
                    return Err(FlowError::schema(
                        path,
                        schema.expected(),
                        format!("string of {} chars", s.trim().chars().count()),
                    ));
                }
            }

            if rules.format == Some(StringFormat::DataUri) && MediaRef::from_data_uri(s).is_err() {
                return Err(FlowError::schema(path, schema.expected(), "malformed data URI"));
            }

            Ok(Value::String(s.to_string()))
        }

        Schema::Number { minimum } => {
            let n = value
                .as_f64()
                .ok_or_else(|| mismatch(path, schema, value))?;

            if let Some(min) = minimum {
                if n < *min {
                    return Err(FlowError::schema(path, schema.expected(), n.to_string()));
                }
            }

            Ok(value.clone())
        }

        Schema::Integer => {
            if value.is_i64() || value.is_u64() {
                return Ok(value.clone());
            }

            // Integral floats are re-typed, fractional ones rejected.
            match value.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(mismatch(path, schema, value)),
            }
        }

        Schema::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(path, schema, value)),

        Schema::Enum(variants) => {
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(path, schema, value))?;

            if variants.iter().any(|v| v == s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(FlowError::schema(path, schema.expected(), format!("\"{}\"", s)))
            }
        }

        Schema::Object(fields) => {
            let obj = value
                .as_object()
                .ok_or_else(|| mismatch(path, schema, value))?;

            let mut out = Map::with_capacity(fields.len());

            for field in fields {
                let field_path = format!("{}.{}", path, field.name);

                match obj.get(&field.name) {
                    Some(Value::Null) if !field.is_required() => {}
                    Some(v) => {
                        out.insert(field.name.clone(), validate_at(&field.schema, v, &field_path)?);
                    }
                    None if !field.is_required() => {}
                    None => {
                        return Err(FlowError::schema(
                            field_path,
                            field.schema.expected(),
                            "missing",
                        ));
                    }
                }
            }

            Ok(Value::Object(out))
        }

        Schema::Array {
            items,
            min_items,
            max_items,
        } => {
            let arr = value
                .as_array()
                .ok_or_else(|| mismatch(path, schema, value))?;

            if let Some(min) = min_items {
                if arr.len() < *min {
                    return Err(FlowError::schema(
                        path,
                        format!("array of at least {} items", min),
                        format!("{} items", arr.len()),
                    ));
                }
            }
            if let Some(max) = max_items {
                if arr.len() > *max {
                    return Err(FlowError::schema(
                        path,
                        format!("array of at most {} items", max),
                        format!("{} items", arr.len()),
                    ));
                }
            }

            arr.iter()
                .enumerate()
                .map(|(i, item)| validate_at(items, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }

        Schema::Record(values) => {
            let obj = value
                .as_object()
                .ok_or_else(|| mismatch(path, schema, value))?;

            let mut out = Map::with_capacity(obj.len());
            for (key, v) in obj {
                out.insert(key.clone(), validate_at(values, v, &format!("{}.{}", path, key))?);
            }
            Ok(Value::Object(out))
        }
    }
}

fn mismatch(path: &str, schema: &Schema, value: &Value) -> FlowError {
    FlowError::schema(path, schema.expected(), value_kind(value))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price_schema() -> Schema {
        Schema::object(vec![
            Field::new("commodity", Schema::non_empty_string()),
            Field::new("price", Schema::number_min(0.0)),
            Field::new("trend", Schema::enumeration(&["up", "down", "stable"])),
            Field::new("note", Schema::string().optional()),
        ])
    }

    #[test]
    fn test_valid_value_is_unchanged() {
        let schema = Schema::object(vec![Field::new(
            "prices",
            Schema::array(price_schema()),
        )]);
        let value = json!({
            "prices": [
                { "commodity": "Paddy", "price": 1800, "trend": "up" },
                { "commodity": "Jute", "price": 4500.5, "trend": "stable", "note": "steady" }
            ]
        });

        let once = validate(&schema, &value).unwrap();
        assert_eq!(once, value);

        let twice = validate(&schema, &once).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_missing_field_reports_path() {
        let err = validate(&price_schema(), &json!({ "commodity": "Paddy", "trend": "up" }))
            .unwrap_err();

        assert_eq!(
            err,
            FlowError::schema("$.price", "number >= 0", "missing")
        );
    }

    #[test]
    fn test_nested_enum_violation() {
        let schema = Schema::array(price_schema());
        let err = validate(
            &schema,
            &json!([
                { "commodity": "Paddy", "price": 1, "trend": "up" },
                { "commodity": "Jute", "price": 2, "trend": "sideways" }
            ]),
        )
        .unwrap_err();

        match err {
            FlowError::SchemaViolation { path, actual, .. } => {
                assert_eq!(path, "$[1].trend");
                assert_eq!(actual, "\"sideways\"");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_are_stripped() {
        let value = json!({ "commodity": "Paddy", "price": 1, "trend": "down", "extra": true });
        let out = validate(&price_schema(), &value).unwrap();
        assert!(out.get("extra").is_none());
    }

    #[test]
    fn test_null_optional_field_is_dropped() {
        let value = json!({ "commodity": "Paddy", "price": 1, "trend": "down", "note": null });
        let out = validate(&price_schema(), &value).unwrap();
        assert!(out.get("note").is_none());
    }

    #[test]
    fn test_no_string_to_number_coercion() {
        let err = validate(&Schema::number(), &json!("1800")).unwrap_err();
        assert_eq!(err, FlowError::schema("$", "number", "string"));
    }

    #[test]
    fn test_integral_float_becomes_integer() {
        assert_eq!(validate(&Schema::integer(), &json!(5.0)).unwrap(), json!(5));
        assert!(validate(&Schema::integer(), &json!(5.5)).is_err());
    }

    #[test]
    fn test_nullable_and_bounds() {
        let schema = Schema::array_bounded(Schema::string().nullable(), Some(1), Some(2));
        assert!(validate(&schema, &json!([null, "a"])).is_ok());
        assert!(validate(&schema, &json!([])).is_err());
        assert!(validate(&schema, &json!(["a", "b", "c"])).is_err());
    }

    #[test]
    fn test_non_empty_string_rejects_blank() {
        assert!(validate(&Schema::non_empty_string(), &json!("   ")).is_err());
        assert!(validate(&Schema::non_empty_string(), &json!("Assam")).is_ok());
    }

    #[test]
    fn test_data_uri_format() {
        assert!(validate(&Schema::data_uri(), &json!("data:image/png;base64,iVBORw0KGgo=")).is_ok());
        assert!(validate(&Schema::data_uri(), &json!("https://example.com/leaf.png")).is_err());
    }

    #[test]
    fn test_record_values_validated() {
        let schema = Schema::record(Schema::string());
        assert!(validate(&schema, &json!({ "farmerName": "Ramen" })).is_ok());

        let err = validate(&schema, &json!({ "landArea": 2 })).unwrap_err();
        assert_eq!(err, FlowError::schema("$.landArea", "string", "number"));
    }

    #[test]
    fn test_validate_into_typed() {
        #[derive(serde::Deserialize)]
        struct Input {
            location: String,
        }

        let schema = Schema::object(vec![Field::new("location", Schema::non_empty_string())]);
        let input: Input = validate_into(&schema, &json!({ "location": "Assam" })).unwrap();
        assert_eq!(input.location, "Assam");
    }
}
