//! Plant and animal disease diagnosis from a photo
//!
//! One structured model call produces the diagnosis. Speech synthesis of the
//! result is a best-effort secondary step: on failure the flow still succeeds
//! and only `audioReplyUrl` is omitted.

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::invoker::ModelCall;
use crate::models::MediaRef;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const PLANT_PROMPT: PromptSpec = PromptSpec::new(
    "diagnose_plant_disease",
    "You are an expert in plant pathology. Identify the disease in the photo and suggest treatments \
in the farmer's native language.

Analyze the image and provide:
1. diseaseName: the common name of the plant disease.
2. description: a detailed description of the disease.
3. stepsToFix: steps the farmer can take to treat the disease, explained clearly in {{nativeLanguage}}.
4. treatment: the name of the recommended pesticide for this disease.

Here is the photo of the diseased plant:
{{media photoDataUri}}",
);

const ANIMAL_PROMPT: PromptSpec = PromptSpec::new(
    "diagnose_animal_disease",
    "You are an expert veterinarian. Identify the disease in the animal from the photo and suggest \
treatments in the farmer's native language.

Analyze the image and provide:
1. diseaseName: the common name of the animal disease.
2. description: a detailed description of the disease, its symptoms and causes.
3. stepsToFix: steps the farmer can take to treat the disease, including care and isolation \
procedures, explained clearly in {{nativeLanguage}}.
4. treatment: the name of the recommended medicine or veterinary drug for this disease.

Here is the photo of the diseased animal:
{{media photoDataUri}}",
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Plant,
    Animal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisInput {
    pub photo_data_uri: String,
    pub native_language: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDiagnosis {
    disease_name: String,
    description: String,
    steps_to_fix: String,
    treatment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisOutput {
    pub disease_name: String,
    pub description: String,
    pub steps_to_fix: String,
    /// Pesticide for plants, medicine for animals
    pub treatment: String,
    /// Always present, for client-side speech when audio is missing
    pub speech_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_reply_url: Option<String>,
}

pub struct DiagnosisFlow {
    subject: Subject,
    ctx: FlowContext,
}

impl DiagnosisFlow {
    pub fn plant(ctx: FlowContext) -> Self {
        Self {
            subject: Subject::Plant,
            ctx,
        }
    }

    pub fn animal(ctx: FlowContext) -> Self {
        Self {
            subject: Subject::Animal,
            ctx,
        }
    }

    fn prompt(&self) -> &'static PromptSpec {
        match self.subject {
            Subject::Plant => &PLANT_PROMPT,
            Subject::Animal => &ANIMAL_PROMPT,
        }
    }

    fn model_schema(&self) -> Schema {
        let treatment = match self.subject {
            Subject::Plant => "The recommended pesticide",
            Subject::Animal => "The recommended medicine or veterinary drug",
        };

        Schema::object(vec![
            Field::new("diseaseName", Schema::non_empty_string()).describe("Common name of the disease"),
            Field::new("description", Schema::non_empty_string()).describe("Description of the disease"),
            Field::new("stepsToFix", Schema::non_empty_string())
                .describe("Treatment steps in the farmer's native language"),
            Field::new("treatment", Schema::non_empty_string()).describe(treatment),
        ])
    }

    /// Best-effort: any failure is logged and yields `None`
    async fn speak(&self, text: &str) -> Option<String> {
        if !self.ctx.config.enable_speech {
            debug!(flow = Flow::name(self), "Speech disabled, skipping synthesis");
            return None;
        }

        let speech = self
            .ctx
            .invoker
            .synthesize_speech(text, None)
            .await
            .and_then(|media| MediaRef::from_data_uri(&media.to_data_uri()));

        match speech {
            Ok(media) => Some(media.to_data_uri()),
            Err(e) => {
                warn!(
                    flow = Flow::name(self),
                    kind = e.kind(),
                    error = %e,
                    "Speech synthesis failed, returning text only"
                );
                None
            }
        }
    }
}

/// Name, description and steps as one script for text-to-speech
pub(crate) fn speech_script(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.ends_with(['.', '!', '?', '।']) {
                p.to_string()
            } else {
                format!("{}.", p)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Flow for DiagnosisFlow {
    type Input = DiagnosisInput;
    type Output = DiagnosisOutput;

    fn name(&self) -> &'static str {
        match self.subject {
            Subject::Plant => "diagnose-plant-disease",
            Subject::Animal => "diagnose-animal-disease",
        }
    }

    fn action_label(&self) -> &'static str {
        match self.subject {
            Subject::Plant => "diagnose plant disease",
            Subject::Animal => "diagnose animal disease",
        }
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("photoDataUri", Schema::data_uri())
                .describe("Photo as a data URI: data:<mimetype>;base64,<encoded_data>"),
            Field::new("nativeLanguage", Schema::non_empty_string()),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("diseaseName", Schema::non_empty_string()),
            Field::new("description", Schema::non_empty_string()),
            Field::new("stepsToFix", Schema::non_empty_string()),
            Field::new("treatment", Schema::non_empty_string()),
            Field::new("speechText", Schema::non_empty_string()),
            Field::new("audioReplyUrl", Schema::data_uri().optional()),
        ])
    }

    async fn run(&self, input: DiagnosisInput, trace: &mut FlowTrace) -> Result<DiagnosisOutput> {
        let prompt = self.prompt().render(&json!({
            "photoDataUri": input.photo_data_uri,
            "nativeLanguage": input.native_language,
        }))?;

        trace.enter(Stage::ModelInvoke);
        let diagnosis: ModelDiagnosis = self
            .ctx
            .invoker
            .structured(ModelCall::new(prompt).with_schema(self.model_schema()))
            .await?;

        let speech_text = speech_script(&[
            &diagnosis.disease_name,
            &diagnosis.description,
            &diagnosis.steps_to_fix,
        ]);

        trace.enter(Stage::SecondaryModelInvoke);
        let audio_reply_url = self.speak(&speech_text).await;

        trace.enter(Stage::Assembling);
        Ok(DiagnosisOutput {
            disease_name: diagnosis.disease_name,
            description: diagnosis.description,
            steps_to_fix: diagnosis.steps_to_fix,
            treatment: diagnosis.treatment,
            speech_text,
            audio_reply_url,
        })
    }
}
