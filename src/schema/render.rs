//! Schema renderings for the model
//!
//! - JSON Schema: appended to prompts that expect structured output
//! - OpenAPI subset: Gemini function declaration parameters
//! - Placeholder: a minimal conforming value (offline mock backend)

use super::{Schema, StringFormat};
use serde_json::{json, Map, Value};

impl Schema {
    pub fn to_json_schema(&self) -> Value {
        match self {
            Schema::String(rules) => {
                let mut out = json!({ "type": "string" });
                if let Some(min) = rules.min_length {
                    out["minLength"] = json!(min);
                }
                if rules.format == Some(StringFormat::DataUri) {
                    out["format"] = json!("data-url");
                }
                out
            }
            Schema::Number { minimum } => {
                let mut out = json!({ "type": "number" });
                if let Some(min) = minimum {
                    out["minimum"] = json!(min);
                }
                out
            }
            Schema::Integer => json!({ "type": "integer" }),
            Schema::Boolean => json!({ "type": "boolean" }),
            Schema::Enum(variants) => json!({ "type": "string", "enum": variants }),
            Schema::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();

                for field in fields {
                    let mut prop = field.schema.to_json_schema();
                    if let Some(desc) = &field.description {
                        prop["description"] = json!(desc);
                    }
                    properties.insert(field.name.clone(), prop);
                    if field.is_required() {
                        required.push(field.name.clone());
                    }
                }

                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
            Schema::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut out = json!({ "type": "array", "items": items.to_json_schema() });
                if let Some(min) = min_items {
                    out["minItems"] = json!(min);
                }
                if let Some(max) = max_items {
                    out["maxItems"] = json!(max);
                }
                out
            }
            Schema::Record(values) => json!({
                "type": "object",
                "additionalProperties": values.to_json_schema(),
            }),
            Schema::Optional(inner) => inner.to_json_schema(),
            Schema::Nullable(inner) => json!({
                "anyOf": [inner.to_json_schema(), { "type": "null" }]
            }),
        }
    }

    pub fn to_openapi(&self) -> Value {
        match self {
            Schema::String(_) => json!({ "type": "STRING" }),
            Schema::Number { .. } => json!({ "type": "NUMBER" }),
            Schema::Integer => json!({ "type": "INTEGER" }),
            Schema::Boolean => json!({ "type": "BOOLEAN" }),
            Schema::Enum(variants) => json!({
                "type": "STRING",
                "format": "enum",
                "enum": variants,
            }),
            Schema::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();

                for field in fields {
                    let mut prop = field.schema.to_openapi();
                    if let Some(desc) = &field.description {
                        prop["description"] = json!(desc);
                    }
                    properties.insert(field.name.clone(), prop);
                    if field.is_required() {
                        required.push(field.name.clone());
                    }
                }

                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                })
            }
            Schema::Array { items, .. } => json!({ "type": "ARRAY", "items": items.to_openapi() }),
            Schema::Record(_) => json!({ "type": "OBJECT" }),
            Schema::Optional(inner) => inner.to_openapi(),
            Schema::Nullable(inner) => {
                let mut out = inner.to_openapi();
                out["nullable"] = json!(true);
                out
            }
        }
    }

    pub fn placeholder(&self) -> Value {
        match self {
            Schema::String(rules) => match rules.format {
                Some(StringFormat::DataUri) => json!("data:text/plain;base64,AA=="),
                None => json!("sample"),
            },
            Schema::Number { minimum } => json!(minimum.unwrap_or(0.0).max(1.0)),
            Schema::Integer => json!(1),
            Schema::Boolean => json!(false),
            Schema::Enum(variants) => variants.first().map(|v| json!(v)).unwrap_or(Value::Null),
            Schema::Object(fields) => {
                let mut out = Map::new();
                for field in fields.iter().filter(|f| f.is_required()) {
                    out.insert(field.name.clone(), field.schema.placeholder());
                }
                Value::Object(out)
            }
            Schema::Array {
                items,
                min_items,
                max_items,
            } => {
                let count = min_items.unwrap_or(1).max(1).min(max_items.unwrap_or(usize::MAX));
                Value::Array((0..count).map(|_| items.placeholder()).collect())
            }
            Schema::Record(_) => json!({}),
            Schema::Optional(inner) | Schema::Nullable(inner) => inner.placeholder(),
        }
    }
}
