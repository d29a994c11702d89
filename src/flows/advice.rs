//! Free-text crop and cattle advice

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::invoker::ModelCall;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

const CROP_PROMPT: PromptSpec = PromptSpec::new(
    "crop_advice",
    "You are an agricultural expert providing crop advice to farmers in India.
A farmer has a question in their native language. Provide a clear, actionable answer in that same language.

Language for Response: {{language}}
Farmer's Query: {{query}}

Analyze the query and provide specific advice with concrete steps.
Return only the advice in the specified language.",
);

const CATTLE_PROMPT: PromptSpec = PromptSpec::new(
    "cattle_advice",
    "You are a veterinary expert specializing in livestock, particularly cattle, in the Indian context.
A farmer has a question about their cattle. Provide a clear, actionable answer in their native language.

Language for Response: {{language}}
Farmer's Query: {{query}}

Provide specific and actionable advice covering health, nutrition or breeding as relevant.
Return only the advice in the farmer's native language.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceInput {
    pub query: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdviceOutput {
    pub advice: String,
}

fn input_schema() -> Schema {
    Schema::object(vec![
        Field::new("query", Schema::non_empty_string()).describe("The farmer's question, typed or transcribed"),
        Field::new("language", Schema::non_empty_string())
            .describe("Language of the query (e.g. Assamese, Hindi, English)"),
    ])
}

fn output_schema() -> Schema {
    Schema::object(vec![Field::new("advice", Schema::non_empty_string())
        .describe("Advice in the farmer's native language")])
}

async fn advise(
    ctx: &FlowContext,
    prompt: &PromptSpec,
    input: AdviceInput,
    trace: &mut FlowTrace,
) -> Result<AdviceOutput> {
    let parts = prompt.render(&json!({ "query": input.query, "language": input.language }))?;

    trace.enter(Stage::ModelInvoke);
    ctx.invoker
        .structured(ModelCall::new(parts).with_schema(output_schema()))
        .await
}

pub struct CropAdviceFlow {
    ctx: FlowContext,
}

impl CropAdviceFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for CropAdviceFlow {
    type Input = AdviceInput;
    type Output = AdviceOutput;

    fn name(&self) -> &'static str {
        "get-crop-advice"
    }

    fn action_label(&self) -> &'static str {
        "get crop advice"
    }

    fn input_schema(&self) -> Schema {
        input_schema()
    }

    fn output_schema(&self) -> Schema {
        output_schema()
    }

    async fn run(&self, input: AdviceInput, trace: &mut FlowTrace) -> Result<AdviceOutput> {
        advise(&self.ctx, &CROP_PROMPT, input, trace).await
    }
}

pub struct CattleAdviceFlow {
    ctx: FlowContext,
}

impl CattleAdviceFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for CattleAdviceFlow {
    type Input = AdviceInput;
    type Output = AdviceOutput;

    fn name(&self) -> &'static str {
        "get-cattle-advice"
    }

    fn action_label(&self) -> &'static str {
        "get cattle advice"
    }

    fn input_schema(&self) -> Schema {
        input_schema()
    }

    fn output_schema(&self) -> Schema {
        output_schema()
    }

    async fn run(&self, input: AdviceInput, trace: &mut FlowTrace) -> Result<AdviceOutput> {
        advise(&self.ctx, &CATTLE_PROMPT, input, trace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::invoke;
    use crate::flows::run_flow;
    use crate::flows::test_support::context_with;
    use crate::models::ModelReply;

    #[tokio::test]
    async fn test_cattle_advice() {
        let (ctx, mock) = context_with(|_| {
            Ok(ModelReply::json(json!({ "advice": "गाय को साफ पानी और हरा चारा दें" })))
        });

        let out = invoke(
            &CattleAdviceFlow::new(ctx),
            AdviceInput {
                query: "मेरी गाय खाना नहीं खा रही है".to_string(),
                language: "Hindi".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(out.advice, "गाय को साफ पानी और हरा चारा दें");
        let prompt = mock.requests()[0].prompt_text();
        assert!(prompt.contains("veterinary expert"));
        assert!(prompt.contains("Language for Response: Hindi"));
    }

    #[tokio::test]
    async fn test_missing_language_rejected() {
        let (ctx, mock) = context_with(|_| Ok(ModelReply::json(json!({ "advice": "x" }))));

        let err = run_flow(&CropAdviceFlow::new(ctx), &json!({ "query": "pests in paddy" }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "schema_violation");
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_advice_is_invalid_output() {
        let (ctx, _mock) = context_with(|_| Ok(ModelReply::json(json!({ "advice": "  " }))));

        let err = run_flow(
            &CropAdviceFlow::new(ctx),
            &json!({ "query": "pests in paddy", "language": "English" }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
    }
}
