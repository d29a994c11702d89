//! Mock language model
//!
//! Recording, scriptable backend. Tests script it with a handler; the server
//! falls back to `MockModel::offline()` when no API key is configured so the
//! flows still answer (with schema-shaped sample data) without the LLM.

use super::LanguageModel;
use crate::models::{MediaRef, ModelReply, ModelRequest, ResponseModality};
use crate::Result;
use async_trait::async_trait;
use std::sync::Mutex;

type Handler = dyn Fn(&ModelRequest) -> Result<ModelReply> + Send + Sync;

pub struct MockModel {
    handler: Box<Handler>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModel {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<ModelReply> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with a conforming sample value
    pub fn offline() -> Self {
        Self::new(|request| {
            Ok(match (request.modality, &request.response_schema) {
                (ResponseModality::Audio, _) => ModelReply::media(MediaRef {
                    mime_type: "audio/wav".to_string(),
                    data: "UklGRiQAAABXQVZFZm10IBAAAAABAAEAQB8AAIA+AAACABAAZGF0YQAAAAA=".to_string(),
                }),
                (ResponseModality::Text, Some(schema)) => ModelReply::json(schema.placeholder()),
                (ResponseModality::Text, None) => ModelReply::text(
                    "The advisory model is offline. Please consult your local Krishi Vigyan Kendra.",
                ),
            })
        })
    }

    /// Number of backend round-trips so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        (self.handler)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, Part};
    use crate::schema::{validate, Field, Schema};

    fn request(schema: Option<Schema>, modality: ResponseModality) -> ModelRequest {
        ModelRequest {
            model: "mock".to_string(),
            messages: vec![Message::user(vec![Part::text("hello")])],
            tools: vec![],
            response_schema: schema,
            modality,
            voice: None,
        }
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockModel::new(|_| Ok(ModelReply::text("ok")));
        mock.generate(&request(None, ResponseModality::Text)).await.unwrap();
        mock.generate(&request(None, ResponseModality::Text)).await.unwrap();

        assert_eq!(mock.calls(), 2);
        assert_eq!(mock.requests()[1].prompt_text(), "hello");
    }

    #[tokio::test]
    async fn test_offline_replies_conform() {
        let schema = Schema::object(vec![Field::new("advice", Schema::non_empty_string())]);
        let mock = MockModel::offline();

        let reply = mock
            .generate(&request(Some(schema.clone()), ResponseModality::Text))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(reply.text.as_deref().unwrap()).unwrap();
        assert!(validate(&schema, &value).is_ok());

        let audio = mock.generate(&request(None, ResponseModality::Audio)).await.unwrap();
        assert!(audio.media.is_some());
    }
}
