//! Voice-driven government form filling
//!
//! The model looks up the form's required fields itself through the form
//! catalog tool, then extracts values from the farmer's query. For catalog
//! forms every required field is present in the output; fields the farmer
//! did not mention are left empty so the client can prompt for them.

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::invoker::ModelCall;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::tools::forms::required_fields;
use crate::tools::{FormCatalogTool, ToolRegistry};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

const FORM_PROMPT: PromptSpec = PromptSpec::new(
    "voice_form_filler",
    "You are an assistant that fills government forms for farmers from their spoken requests.

Form Name: {{formName}}
Voice Query: {{voiceQuery}}

First call the form_fields tool to learn which fields this form requires. Then extract a value for \
each field from the voice query. Use the exact field names returned by the tool as keys and strings \
as values; use an empty string for anything the farmer did not say. Finally write a short \
confirmation message, in the language of the query, summarizing the extracted data.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFillerInput {
    pub voice_query: String,
    pub form_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormFillerOutput {
    pub filled_form_data: BTreeMap<String, String>,
    pub confirmation_message: String,
}

pub struct FormFillerFlow {
    ctx: FlowContext,
    tools: Arc<ToolRegistry>,
}

impl FormFillerFlow {
    pub fn new(ctx: FlowContext) -> Result<Self> {
        let tools = ToolRegistry::with_tools(vec![Arc::new(FormCatalogTool)])?;
        Ok(Self {
            ctx,
            tools: Arc::new(tools),
        })
    }
}

#[async_trait]
impl Flow for FormFillerFlow {
    type Input = FormFillerInput;
    type Output = FormFillerOutput;

    fn name(&self) -> &'static str {
        "voice-form-filler"
    }

    fn action_label(&self) -> &'static str {
        "fill form"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("voiceQuery", Schema::non_empty_string())
                .describe("The farmer's spoken or transcribed request"),
            Field::new("formName", Schema::non_empty_string()).describe("Government form to fill"),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("filledFormData", Schema::record(Schema::string()))
                .describe("Field name to extracted value"),
            Field::new("confirmationMessage", Schema::non_empty_string()),
        ])
    }

    async fn run(&self, input: FormFillerInput, trace: &mut FlowTrace) -> Result<FormFillerOutput> {
        let prompt = FORM_PROMPT.render(&json!({
            "formName": input.form_name,
            "voiceQuery": input.voice_query,
        }))?;

        trace.enter(Stage::ModelInvoke);
        let mut output: FormFillerOutput = self
            .ctx
            .invoker
            .structured(
                ModelCall::new(prompt)
                    .with_schema(self.output_schema())
                    .with_tools(self.tools.clone()),
            )
            .await?;

        trace.enter(Stage::Assembling);
        if let Some(fields) = required_fields(&input.form_name) {
            let missing: Vec<&str> = fields
                .iter()
                .copied()
                .filter(|f| !output.filled_form_data.contains_key(*f))
                .collect();

            if !missing.is_empty() {
                warn!(
                    flow = Flow::name(self),
                    form = %input.form_name,
                    ?missing,
                    "Model omitted required fields, leaving them empty"
                );
                for field in missing {
                    output.filled_form_data.insert(field.to_string(), String::new());
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::run_flow;
    use crate::flows::test_support::context_with;
    use crate::models::{ModelReply, Part};

    #[tokio::test]
    async fn test_model_looks_up_fields_then_fills() {
        let (ctx, mock) = context_with(|req| {
            let last = req.messages.last().unwrap();
            match &last.parts[0] {
                Part::ToolResult { result } => {
                    assert_eq!(result.output["formName"], "Soil Health Card Request");
                    Ok(ModelReply::json(json!({
                        "filledFormData": {
                            "farmerName": "Ramesh Das",
                            "village": "Majuli",
                            "district": "Majuli",
                            "cropPlanned": "Mustard"
                        },
                        "confirmationMessage": "Soil Health Card request for Ramesh Das, Majuli."
                    })))
                }
                _ => Ok(ModelReply::tool_call(
                    FormCatalogTool::NAME,
                    json!({ "formName": "soil health card" }),
                )),
            }
        });
        let flow = FormFillerFlow::new(ctx).unwrap();

        let out = run_flow(
            &flow,
            &json!({
                "voiceQuery": "My name is Ramesh Das from Majuli, I want to plant mustard",
                "formName": "Soil Health Card Request"
            }),
        )
        .await
        .unwrap();

        let data = out["filledFormData"].as_object().unwrap();
        for field in required_fields("Soil Health Card Request").unwrap() {
            assert!(data.contains_key(*field), "missing {}", field);
        }
        assert_eq!(data["farmerName"], "Ramesh Das");
        assert_eq!(data["mobileNumber"], "");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools[0].name, FormCatalogTool::NAME);
    }

    #[tokio::test]
    async fn test_unknown_form_passes_model_fields_through() {
        let (ctx, _mock) = context_with(|_| {
            Ok(ModelReply::json(json!({
                "filledFormData": { "tractorModel": "Mahindra 575" },
                "confirmationMessage": "Noted."
            })))
        });
        let flow = FormFillerFlow::new(ctx).unwrap();

        let out = run_flow(
            &flow,
            &json!({ "voiceQuery": "Mahindra 575 tractor", "formName": "Tractor Subsidy" }),
        )
        .await
        .unwrap();

        assert_eq!(out["filledFormData"], json!({ "tractorModel": "Mahindra 575" }));
    }

    #[tokio::test]
    async fn test_non_string_values_rejected() {
        let (ctx, _mock) = context_with(|_| {
            Ok(ModelReply::json(json!({
                "filledFormData": { "landAreaAcres": 2.5 },
                "confirmationMessage": "Noted."
            })))
        });
        let flow = FormFillerFlow::new(ctx).unwrap();

        let err = run_flow(&flow, &json!({ "voiceQuery": "2.5 acres", "formName": "KCC" }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "model_output_invalid");
    }
}
