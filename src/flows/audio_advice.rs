//! Crop advice from a recorded voice query
//!
//! Two sequential model calls: transcribe, then advise. The advice prompt is
//! built only after the transcript is available and embeds it verbatim.

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::error::FlowError;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FLOW_NAME: &str = "get-advice-from-audio";

const TRANSCRIBE_PROMPT: PromptSpec = PromptSpec::new(
    "transcribe_audio",
    "Transcribe the following audio from a farmer speaking in {{language}}. \
Return only the transcript.
{{media audioDataUri}}",
);

const ADVICE_PROMPT: PromptSpec = PromptSpec::new(
    "advice_from_transcript",
    "You are an agricultural expert providing crop advice to farmers in India.
A farmer has a question in their native language. Provide a clear, actionable answer in that same language.

Language for Response: {{language}}
Farmer's Query: \"{{transcript}}\"

Analyze the query and provide specific advice with concrete steps.
Return only the advice in the specified language.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAdviceInput {
    pub audio_data_uri: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioAdviceOutput {
    pub transcript: Option<String>,
    pub advice: Option<String>,
}

/// What callers of the entry point receive: failures become data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioAdviceReply {
    pub transcript: Option<String>,
    pub advice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AudioAdviceReply {
    pub fn from_result(result: Result<Value>, action_label: &str) -> Self {
        match result.and_then(|v| {
            serde_json::from_value::<AudioAdviceOutput>(v)
                .map_err(|e| FlowError::ModelOutputInvalid(e.to_string()))
        }) {
            Ok(out) => Self {
                transcript: out.transcript,
                advice: out.advice,
                error: None,
            },
            Err(e) => Self {
                transcript: None,
                advice: None,
                error: Some(format!("Failed to {}: {}", action_label, e)),
            },
        }
    }
}

pub struct AudioAdviceFlow {
    ctx: FlowContext,
}

impl AudioAdviceFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

fn non_blank(text: String, what: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FlowError::ModelOutputInvalid(format!("empty {}", what)));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl Flow for AudioAdviceFlow {
    type Input = AudioAdviceInput;
    type Output = AudioAdviceOutput;

    fn name(&self) -> &'static str {
        FLOW_NAME
    }

    fn action_label(&self) -> &'static str {
        "get advice from audio"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("audioDataUri", Schema::data_uri())
                .describe("Voice query as a data URI: data:<mimetype>;base64,<encoded_data>"),
            Field::new("language", Schema::non_empty_string())
                .describe("Native language of the farmer (e.g. Assamese, Hindi, English)"),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("transcript", Schema::string().nullable()),
            Field::new("advice", Schema::string().nullable()),
        ])
    }

    async fn run(&self, input: AudioAdviceInput, trace: &mut FlowTrace) -> Result<AudioAdviceOutput> {
        trace.enter(Stage::ModelInvoke);

        let prompt = TRANSCRIBE_PROMPT.render(&json!({
            "audioDataUri": input.audio_data_uri,
            "language": input.language,
        }))?;
        let transcript = non_blank(self.ctx.invoker.generate_text(prompt).await?, "transcript")?;

        let prompt = ADVICE_PROMPT.render(&json!({
            "language": input.language,
            "transcript": transcript,
        }))?;
        let advice = non_blank(self.ctx.invoker.generate_text(prompt).await?, "advice")?;

        trace.enter(Stage::Assembling);
        Ok(AudioAdviceOutput {
            transcript: Some(transcript),
            advice: Some(advice),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::run_flow;
    use crate::flows::test_support::context_with;
    use crate::models::ModelReply;

    const AUDIO: &str = "data:audio/webm;base64,GkXfo59ChoEB";
    const TRANSCRIPT: &str = "मेरे धान के खेत में कीट लग गए हैं";

    #[tokio::test]
    async fn test_advice_prompt_contains_exact_transcript() {
        let (ctx, mock) = context_with(|req| {
            if req.media().is_empty() {
                Ok(ModelReply::text("नीम का तेल छिड़कें"))
            } else {
                Ok(ModelReply::text(TRANSCRIPT))
            }
        });

        let out = run_flow(
            &AudioAdviceFlow::new(ctx),
            &json!({ "audioDataUri": AUDIO, "language": "Hindi" }),
        )
        .await
        .unwrap();

        assert_eq!(out["transcript"], TRANSCRIPT);
        assert_eq!(out["advice"], "नीम का तेल छिड़कें");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].media().len(), 1);
        assert!(requests[1].prompt_text().contains(TRANSCRIPT));
        assert!(requests[1].media().is_empty());
    }

    #[tokio::test]
    async fn test_empty_transcript_stops_before_advice() {
        let (ctx, mock) = context_with(|_| Ok(ModelReply::text("   ")));

        let err = run_flow(
            &AudioAdviceFlow::new(ctx),
            &json!({ "audioDataUri": AUDIO, "language": "Hindi" }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_reply_wrapper_converts_failure() {
        let (ctx, _mock) = context_with(|_| {
            Err(FlowError::ModelUnavailable("quota exceeded".to_string()))
        });
        let flow = AudioAdviceFlow::new(ctx);

        let result = run_flow(&flow, &json!({ "audioDataUri": AUDIO, "language": "Hindi" })).await;
        let reply = AudioAdviceReply::from_result(result, Flow::action_label(&flow));

        assert_eq!(reply.transcript, None);
        assert_eq!(reply.advice, None);
        assert_eq!(
            reply.error.as_deref(),
            Some("Failed to get advice from audio: Model unavailable: quota exceeded")
        );

        let json = serde_json::to_value(&reply).unwrap();
        assert!(json["transcript"].is_null());
    }
}
