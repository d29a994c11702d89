//! Model Invoker
//!
//! Wraps a `LanguageModel` backend with everything a flow expects from a
//! single logical model call:
//! - structured output (shape instruction + parse + schema validation)
//! - the bounded model-directed tool loop
//! - a timeout at the backend boundary
//! - speech synthesis through the audio response modality

use crate::config::{AppConfig, DEFAULT_MODEL, DEFAULT_TTS_MODEL, DEFAULT_VOICE};
use crate::error::FlowError;
use crate::models::{
    CallConfig, MediaRef, Message, ModelOutput, ModelReply, ModelRequest, ModelResponse, Part,
    ResponseModality, ToolCall, ToolResult,
};
use crate::schema::{self, Schema};
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub mod gemini;
pub mod mock;

pub use gemini::GeminiClient;
pub use mock::MockModel;

/// Trait for one backend round-trip (no tool loop, no validation)
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply>;
}

/// A single logical model call as seen by a flow
#[derive(Clone, Default)]
pub struct ModelCall {
    pub prompt: Vec<Part>,
    pub output_schema: Option<Schema>,
    pub tools: Option<Arc<ToolRegistry>>,
    pub config: CallConfig,
}

impl ModelCall {
    pub fn new(prompt: Vec<Part>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_config(mut self, config: CallConfig) -> Self {
        self.config = config;
        self
    }
}

pub struct ModelInvoker {
    backend: Arc<dyn LanguageModel>,
    default_model: String,
    speech_model: String,
    default_voice: String,
    timeout: Duration,
    max_tool_iterations: usize,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn LanguageModel>) -> Self {
        Self {
            backend,
            default_model: DEFAULT_MODEL.to_string(),
            speech_model: DEFAULT_TTS_MODEL.to_string(),
            default_voice: DEFAULT_VOICE.to_string(),
            timeout: Duration::from_secs(60),
            max_tool_iterations: 5,
        }
    }

    pub fn from_config(backend: Arc<dyn LanguageModel>, config: &AppConfig) -> Self {
        Self {
            backend,
            default_model: config.model.clone(),
            speech_model: config.tts_model.clone(),
            default_voice: config.voice.clone(),
            timeout: config.model_timeout,
            max_tool_iterations: config.max_tool_iterations,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one logical call, looping over model-directed tool calls
    pub async fn invoke(&self, call: ModelCall) -> Result<ModelResponse> {
        let ModelCall {
            mut prompt,
            output_schema,
            tools,
            config,
        } = call;

        if let Some(schema) = &output_schema {
            prompt.push(Part::text(structured_output_instruction(schema)));
        }

        let tools = tools.filter(|t| !t.is_empty());

        let mut request = ModelRequest {
            model: config.model.unwrap_or_else(|| self.default_model.clone()),
            messages: vec![Message::user(prompt)],
            tools: tools.as_ref().map(|t| t.declarations()).unwrap_or_default(),
            response_schema: output_schema.clone(),
            modality: config.modality,
            voice: config.voice,
        };

        for round in 0..=self.max_tool_iterations {
            let reply = self.call_backend(&request).await?;

            if reply.tool_calls.is_empty() {
                return finish(reply, output_schema.as_ref(), request.modality);
            }

            let registry = tools.as_ref().ok_or_else(|| {
                FlowError::ModelOutputInvalid(format!(
                    "model requested tool '{}' but no tools were supplied",
                    reply.tool_calls[0].name
                ))
            })?;

            if round == self.max_tool_iterations {
                break;
            }

            debug!(
                round,
                tools = ?reply.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model requested tool calls"
            );

            let outputs = futures::future::try_join_all(
                reply.tool_calls.iter().map(|c| run_tool(registry, c)),
            )
            .await?;

            request.messages.push(Message::model(
                reply
                    .tool_calls
                    .iter()
                    .cloned()
                    .map(|call| Part::ToolCall { call })
                    .collect(),
            ));
            request.messages.push(Message::user(
                reply
                    .tool_calls
                    .into_iter()
                    .zip(outputs)
                    .map(|(call, output)| Part::ToolResult {
                        result: ToolResult {
                            name: call.name,
                            output,
                        },
                    })
                    .collect(),
            ));
        }

        Err(FlowError::ModelOutputInvalid(format!(
            "tool call still unresolved after {} iterations",
            self.max_tool_iterations
        )))
    }

    pub async fn generate_text(&self, prompt: Vec<Part>) -> Result<String> {
        let response = self.invoke(ModelCall::new(prompt)).await?;
        Ok(response.text().unwrap_or_default().to_string())
    }

    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: Vec<Part>,
        schema: &Schema,
    ) -> Result<T> {
        self.structured(ModelCall::new(prompt).with_schema(schema.clone()))
            .await
    }

    /// Invoke and deserialize the structured output
    pub async fn structured<T: DeserializeOwned>(&self, call: ModelCall) -> Result<T> {
        match self.invoke(call).await?.output {
            ModelOutput::Structured(value) => serde_json::from_value(value)
                .map_err(|e| FlowError::ModelOutputInvalid(format!("unexpected shape: {}", e))),
            ModelOutput::Text(_) => Err(FlowError::ModelOutputInvalid(
                "expected structured output".to_string(),
            )),
        }
    }

    pub async fn synthesize_speech(&self, text: &str, voice: Option<&str>) -> Result<MediaRef> {
        let call = ModelCall::new(vec![Part::text(text)]).with_config(CallConfig {
            model: Some(self.speech_model.clone()),
            modality: ResponseModality::Audio,
            voice: Some(voice.unwrap_or(&self.default_voice).to_string()),
        });

        self.invoke(call)
            .await?
            .media
            .ok_or_else(|| FlowError::ModelOutputInvalid("no audio in speech response".to_string()))
    }

    async fn call_backend(&self, request: &ModelRequest) -> Result<ModelReply> {
        let start = Instant::now();

        let reply = tokio::time::timeout(self.timeout, self.backend.generate(request))
            .await
            .map_err(|_| {
                warn!(
                    backend = self.backend.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Model call timed out"
                );
                FlowError::ModelUnavailable(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })??;

        debug!(
            backend = self.backend.name(),
            model = %request.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model call completed"
        );

        Ok(reply)
    }
}

async fn run_tool(registry: &ToolRegistry, call: &ToolCall) -> Result<Value> {
    if registry.get(&call.name).is_none() {
        return Err(FlowError::ModelOutputInvalid(format!(
            "model requested unknown tool '{}'",
            call.name
        )));
    }

    registry
        .invoke(&call.name, &call.arguments)
        .await
        .map_err(|e| match e {
            FlowError::SchemaViolation { .. } => FlowError::ModelOutputInvalid(format!(
                "invalid arguments for tool '{}': {}",
                call.name, e
            )),
            other => other,
        })
}

fn finish(
    reply: ModelReply,
    schema: Option<&Schema>,
    modality: ResponseModality,
) -> Result<ModelResponse> {
    if modality == ResponseModality::Audio {
        let media = reply
            .media
            .ok_or_else(|| FlowError::ModelOutputInvalid("no audio payload in reply".to_string()))?;
        return Ok(ModelResponse {
            output: ModelOutput::Text(reply.text.unwrap_or_default()),
            media: Some(media),
        });
    }

    let Some(schema) = schema else {
        return Ok(ModelResponse {
            output: ModelOutput::Text(reply.text.unwrap_or_default()),
            media: reply.media,
        });
    };

    let text = reply
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| FlowError::ModelOutputInvalid("empty structured response".to_string()))?;

    let value = parse_json_payload(&text)?;
    let value = schema::validate(schema, &value).map_err(|e| {
        FlowError::ModelOutputInvalid(format!("response does not match schema: {}", e))
    })?;

    Ok(ModelResponse {
        output: ModelOutput::Structured(value),
        media: reply.media,
    })
}

fn structured_output_instruction(schema: &Schema) -> String {
    format!(
        "Respond with a single JSON value (no prose, no markdown) that conforms to this JSON Schema:\n{}",
        schema.to_json_schema()
    )
}

/// Parse a JSON reply, tolerating markdown fences and surrounding prose
pub(crate) fn parse_json_payload(text: &str) -> Result<Value> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    // Fallback: the largest { ... } block in the text
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(FlowError::ModelOutputInvalid(format!(
        "response is not valid JSON: {}",
        preview(text, 120)
    )))
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use crate::tools::{FormCatalogTool, Tool};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn advice_schema() -> Schema {
        Schema::object(vec![Field::new("advice", Schema::non_empty_string())])
    }

    fn form_tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FormCatalogTool)).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_structured_output_validated() {
        let mock = Arc::new(MockModel::new(|_| {
            Ok(ModelReply::text("```json\n{\"advice\": \"Spray neem oil\"}\n```"))
        }));
        let invoker = ModelInvoker::new(mock.clone());

        let value: Value = invoker
            .generate_structured(vec![Part::text("help")], &advice_schema())
            .await
            .unwrap();

        assert_eq!(value, json!({ "advice": "Spray neem oil" }));

        let request = &mock.requests()[0];
        assert!(request.response_schema.is_some());
        assert!(request.prompt_text().contains("JSON Schema"));
    }

    #[tokio::test]
    async fn test_malformed_structured_output() {
        let mock = Arc::new(MockModel::new(|_| Ok(ModelReply::json(json!({ "tip": "x" })))));
        let invoker = ModelInvoker::new(mock);

        let err = invoker
            .generate_structured::<Value>(vec![Part::text("help")], &advice_schema())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "model_output_invalid");

        let mock = Arc::new(MockModel::new(|_| Ok(ModelReply::text("I cannot answer that"))));
        let err = ModelInvoker::new(mock)
            .generate_structured::<Value>(vec![Part::text("help")], &advice_schema())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "model_output_invalid");
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let mock = Arc::new(MockModel::new(|_| {
            Err(FlowError::ModelUnavailable("quota exceeded".to_string()))
        }));
        let err = ModelInvoker::new(mock)
            .generate_text(vec![Part::text("hi")])
            .await
            .unwrap_err();

        assert_eq!(err, FlowError::ModelUnavailable("quota exceeded".to_string()));
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate(&self, _request: &ModelRequest) -> Result<ModelReply> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelReply::text("late"))
        }
    }

    #[tokio::test]
    async fn test_timeout_is_model_unavailable() {
        let invoker = ModelInvoker::new(Arc::new(SlowModel)).with_timeout(Duration::from_millis(20));
        let err = invoker.generate_text(vec![Part::text("hi")]).await.unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_result_back() {
        let mock = Arc::new(MockModel::new(|req| {
            match req.messages.len() {
                1 => Ok(ModelReply::tool_call(
                    FormCatalogTool::NAME,
                    json!({ "formName": "Soil Health Card Request" }),
                )),
                _ => {
                    let last = req.messages.last().unwrap();
                    match &last.parts[0] {
                        Part::ToolResult { result } => {
                            let count = result.output["fields"].as_array().map(|f| f.len()).unwrap_or(0);
                            Ok(ModelReply::json(json!({ "advice": format!("{} fields", count) })))
                        }
                        other => panic!("expected tool result, got {:?}", other),
                    }
                }
            }
        }));
        let invoker = ModelInvoker::new(mock.clone());

        let call = ModelCall::new(vec![Part::text("fill")])
            .with_schema(advice_schema())
            .with_tools(form_tools());
        let value: Value = invoker.structured(call).await.unwrap();

        assert_eq!(value["advice"], "6 fields");
        assert_eq!(mock.calls(), 2);

        let first = &mock.requests()[0];
        assert_eq!(first.tools.len(), 1);
        assert_eq!(first.tools[0].parameters, FormCatalogTool.input_schema());
    }

    #[tokio::test]
    async fn test_tool_loop_is_bounded() {
        let mock = Arc::new(MockModel::new(|_| {
            Ok(ModelReply::tool_call(FormCatalogTool::NAME, json!({ "formName": "KCC" })))
        }));
        let invoker = ModelInvoker::new(mock.clone()).with_max_tool_iterations(2);

        let err = invoker
            .invoke(ModelCall::new(vec![Part::text("loop")]).with_tools(form_tools()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_tool_arguments() {
        let mock = Arc::new(MockModel::new(|_| {
            Ok(ModelReply::tool_call(FormCatalogTool::NAME, json!({ "name": 3 })))
        }));
        let err = ModelInvoker::new(mock)
            .invoke(ModelCall::new(vec![Part::text("x")]).with_tools(form_tools()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
    }

    struct LandRecordsTool;

    #[async_trait]
    impl Tool for LandRecordsTool {
        fn name(&self) -> &'static str {
            "land_records"
        }

        fn description(&self) -> &'static str {
            "Look up land records for a village"
        }

        fn input_schema(&self) -> Schema {
            Schema::object(vec![Field::new("village", Schema::non_empty_string())])
        }

        fn output_schema(&self) -> Schema {
            Schema::object(vec![Field::new("owner", Schema::non_empty_string())])
        }

        async fn execute(&self, _input: &Value) -> Result<Value> {
            Err(FlowError::tool("land_records", "records service unreachable"))
        }
    }

    #[tokio::test]
    async fn test_tool_failure_propagates() {
        let mock = Arc::new(MockModel::new(|_| {
            Ok(ModelReply::tool_call("land_records", json!({ "village": "Majuli" })))
        }));
        let tools = ToolRegistry::with_tools(vec![Arc::new(LandRecordsTool)]).unwrap();

        let err = ModelInvoker::new(mock.clone())
            .invoke(ModelCall::new(vec![Part::text("x")]).with_tools(Arc::new(tools)))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::ToolExecutionError { ref tool, .. } if tool == "land_records"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_without_tools() {
        let mock = Arc::new(MockModel::new(|_| Ok(ModelReply::tool_call("anything", json!({})))));
        let err = ModelInvoker::new(mock)
            .generate_text(vec![Part::text("x")])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
    }

    #[tokio::test]
    async fn test_speech_uses_audio_modality() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let mock = Arc::new(MockModel::new(move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.modality, ResponseModality::Audio);
            assert_eq!(req.model, DEFAULT_TTS_MODEL);
            assert_eq!(req.voice.as_deref(), Some(DEFAULT_VOICE));
            Ok(ModelReply::media(MediaRef {
                mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                data: "AAAA".to_string(),
            }))
        }));

        let media = ModelInvoker::new(mock)
            .synthesize_speech("Leaf blight", None)
            .await
            .unwrap();

        assert_eq!(media.data, "AAAA");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_json_payload_with_prose() {
        let value = parse_json_payload("Here you go: {\"a\": 1} hope it helps").unwrap();
        assert_eq!(value, json!({ "a": 1 }));
        assert!(parse_json_payload("no json here").is_err());
    }
}
