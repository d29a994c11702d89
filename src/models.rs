//! Core data models shared by the invoker, tools and flows

use crate::error::FlowError;
use crate::schema::Schema;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

//
// ================= Media =================
//

/// Inline media payload (base64 encoded, never decoded by this crate)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub mime_type: String,
    pub data: String,
}

impl MediaRef {
    /// Parse `data:<mime>;base64,<payload>`
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| FlowError::schema("$", "data URI", reason.to_string());

        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing 'data:' prefix"))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| invalid("missing ';base64,' marker"))?;

        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(invalid("missing MIME type"));
        }
        if data.is_empty() {
            return Err(invalid("empty payload"));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

//
// ================= Prompt Parts =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Part {
    Text { text: String },
    Media { media: MediaRef },
    ToolCall { call: ToolCall },
    ToolResult { result: ToolResult },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn media(media: MediaRef) -> Self {
        Part::Media { media }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub name: String,
    pub output: Value,
}

/// What the backend is told about a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

//
// ================= Backend Request / Reply =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    #[default]
    Text,
    Audio,
}

/// Per-call model selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallConfig {
    /// Overrides the invoker's default model id
    pub model: Option<String>,
    pub modality: ResponseModality,
    pub voice: Option<String>,
}

/// Single backend round-trip, fully resolved by the invoker
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDeclaration>,
    /// Set when the reply must be a JSON body of this shape
    pub response_schema: Option<Schema>,
    pub modality: ResponseModality,
    pub voice: Option<String>,
}

impl ModelRequest {
    /// Concatenated text of every prompt part, in order
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn media(&self) -> Vec<&MediaRef> {
        self.messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .filter_map(|p| match p {
                Part::Media { media } => Some(media),
                _ => None,
            })
            .collect()
    }
}

/// One backend reply: final text, tool calls, or media
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub media: Option<MediaRef>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn json(value: Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
            ..Default::default()
        }
    }

    pub fn media(media: MediaRef) -> Self {
        Self {
            media: Some(media),
            ..Default::default()
        }
    }
}

//
// ================= Invoker Result =================
//

#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Text(String),
    Structured(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub output: ModelOutput,
    pub media: Option<MediaRef>,
}

impl ModelResponse {
    pub fn text(&self) -> Option<&str> {
        match &self.output {
            ModelOutput::Text(t) => Some(t),
            ModelOutput::Structured(_) => None,
        }
    }
}

//
// ================= Shared Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub const VARIANTS: [&'static str; 3] = ["up", "down", "stable"];
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        };
        write!(f, "{}", s)
    }
}
