//! Gemini generateContent backend
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::LanguageModel;
use crate::error::FlowError;
use crate::models::{MediaRef, Message, ModelReply, ModelRequest, Part, ResponseModality, Role, ToolCall};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(FlowError::Configuration(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| FlowError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = build_request(request);

        info!(model = %request.model, turns = body.contents.len(), "Calling Gemini API");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            FlowError::ModelUnavailable(format!("Gemini API error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(FlowError::ModelUnavailable(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            FlowError::ModelUnavailable(format!("Gemini parse error: {}", e))
        })?;

        parse_response(gemini_response)
    }
}

//
// ================= Wire Format =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolBlock>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolBlock {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request(request: &ModelRequest) -> GeminiRequest {
    let contents = request.messages.iter().map(to_content).collect();

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolBlock {
            function_declarations: request
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.to_openapi(),
                })
                .collect(),
        }]
    };

    let generation_config = match request.modality {
        ResponseModality::Audio => GenerationConfig {
            temperature: 1.0,
            response_mime_type: None,
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: request.voice.as_ref().map(|voice| {
                json!({ "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } } })
            }),
        },
        ResponseModality::Text => GenerationConfig {
            temperature: 0.3,
            // JSON mode cannot be combined with function calling
            response_mime_type: (request.response_schema.is_some() && request.tools.is_empty())
                .then(|| "application/json".to_string()),
            response_modalities: None,
            speech_config: None,
        },
    };

    GeminiRequest {
        contents,
        tools,
        generation_config,
    }
}

fn to_content(message: &Message) -> Content {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };

    Content {
        role: Some(role.to_string()),
        parts: message.parts.iter().map(to_wire_part).collect(),
    }
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text { text } => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::Media { media } => WirePart {
            inline_data: Some(InlineData {
                mime_type: media.mime_type.clone(),
                data: media.data.clone(),
            }),
            ..Default::default()
        },
        Part::ToolCall { call } => WirePart {
            function_call: Some(FunctionCall {
                name: call.name.clone(),
                args: call.arguments.clone(),
            }),
            ..Default::default()
        },
        Part::ToolResult { result } => WirePart {
            function_response: Some(FunctionResponse {
                name: result.name.clone(),
                response: json!({ "name": result.name, "content": result.output }),
            }),
            ..Default::default()
        },
    }
}

fn parse_response(response: GeminiResponse) -> Result<ModelReply> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        FlowError::ModelOutputInvalid(match &block_reason {
            Some(reason) => format!("Gemini blocked the prompt: {}", reason),
            None => "No response from Gemini API".to_string(),
        })
    })?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        return Err(FlowError::ModelOutputInvalid(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let mut reply = ModelReply::default();
    let mut text = String::new();

    for part in parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(data) = part.inline_data {
            reply.media.get_or_insert(MediaRef {
                mime_type: data.mime_type,
                data: data.data,
            });
        }
        if let Some(call) = part.function_call {
            reply.tool_calls.push(ToolCall {
                name: call.name,
                arguments: call.args,
            });
        }
    }

    if !text.is_empty() {
        reply.text = Some(text);
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ToolDeclaration, ToolResult};
    use crate::schema::{Field, Schema};

    fn request(modality: ResponseModality) -> ModelRequest {
        ModelRequest {
            model: "gemini-2.5-flash".to_string(),
            messages: vec![Message::user(vec![
                Part::text("What is wrong with this leaf?"),
                Part::media(MediaRef {
                    mime_type: "image/jpeg".to_string(),
                    data: "/9j/4AAQ".to_string(),
                }),
            ])],
            tools: vec![],
            response_schema: Some(Schema::object(vec![Field::new("a", Schema::string())])),
            modality,
            voice: Some("Algenib".to_string()),
        }
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        assert!(matches!(
            GeminiClient::new(String::new()),
            Err(FlowError::Configuration(_))
        ));
    }

    #[test]
    fn test_text_request_shape() {
        let body = serde_json::to_value(build_request(&request(ResponseModality::Text))).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_audio_request_shape() {
        let body = serde_json::to_value(build_request(&request(ResponseModality::Audio))).unwrap();

        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Algenib"
        );
    }

    #[test]
    fn test_tool_turns_serialized() {
        let mut req = request(ResponseModality::Text);
        req.tools.push(ToolDeclaration {
            name: "form_fields".to_string(),
            description: "Look up a form".to_string(),
            parameters: Schema::object(vec![Field::new("formName", Schema::string())]),
        });
        req.messages.push(Message::model(vec![Part::ToolCall {
            call: ToolCall {
                name: "form_fields".to_string(),
                arguments: json!({ "formName": "KCC" }),
            },
        }]));
        req.messages.push(Message::user(vec![Part::ToolResult {
            result: ToolResult {
                name: "form_fields".to_string(),
                output: json!({ "known": true }),
            },
        }]));

        let body = serde_json::to_value(build_request(&req)).unwrap();

        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "form_fields");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["args"]["formName"], "KCC");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["content"]["known"],
            true
        );
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_parse_response_collects_parts() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "{\"a\":" },
                        { "text": "\"b\"}" },
                        { "functionCall": { "name": "form_fields", "args": { "formName": "KCC" } } }
                    ]
                },
                "finishReason": "STOP"
            }]
        });

        let reply = parse_response(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(reply.text.as_deref(), Some("{\"a\":\"b\"}"));
        assert_eq!(reply.tool_calls.len(), 1);
    }

    #[test]
    fn test_parse_audio_response() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAAA" } }] }
            }]
        });

        let reply = parse_response(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(reply.media.unwrap().mime_type, "audio/L16;codec=pcm;rate=24000");
    }

    #[test]
    fn test_blocked_prompt() {
        let raw = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_response(serde_json::from_value(raw).unwrap()).unwrap_err();
        assert_eq!(
            err,
            FlowError::ModelOutputInvalid("Gemini blocked the prompt: SAFETY".to_string())
        );
    }
}
