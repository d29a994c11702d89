//! Prompt templates with named slots
//!
//! `{{name}}` is replaced by the text of `vars.name`; `{{media name}}`
//! splits the prompt and inserts `vars.name` (a data URI) as a media part.

use crate::error::FlowError;
use crate::models::{MediaRef, Part};
use crate::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct PromptSpec {
    pub name: &'static str,
    pub template: &'static str,
}

impl PromptSpec {
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }

    pub fn render(&self, vars: &Value) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = self.template;

        while let Some(start) = rest.find("{{") {
            text.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let end = after.find("}}").ok_or_else(|| {
                FlowError::Configuration(format!("prompt '{}' has an unclosed slot", self.name))
            })?;
            let slot = after[..end].trim();

            if let Some(name) = slot.strip_prefix("media ") {
                let uri = lookup(vars, name.trim())?;
                let media = MediaRef::from_data_uri(&uri).map_err(|_| {
                    FlowError::schema(format!("$.{}", name.trim()), "data URI string", "malformed data URI")
                })?;

                if !text.trim().is_empty() {
                    parts.push(Part::text(text.trim_end()));
                }
                text.clear();
                parts.push(Part::media(media));
            } else {
                text.push_str(&lookup(vars, slot)?);
            }

            rest = &after[end + 2..];
        }

        text.push_str(rest);
        if !text.trim().is_empty() {
            parts.push(Part::text(text.trim()));
        }

        Ok(parts)
    }
}

fn lookup(vars: &Value, name: &str) -> Result<String> {
    match vars.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(FlowError::schema(
            format!("$.{}", name),
            "value for prompt slot",
            "missing",
        )),
        Some(other) => Ok(other.to_string()),
    }
}
