//! Farm report from free-text farm records
//!
//! Produces a markdown report; rendering to PDF is left to the client.

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::error::FlowError;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

const REPORT_PROMPT: PromptSpec = PromptSpec::new(
    "farm_report",
    "You are an assistant that writes farm reports for Indian farmers and extension officers.

Farm Details: {{farmDetails}}
Historical Data: {{historicalData}}
Soil Quality: {{soilQuality}}
Market Trends: {{marketTrends}}

Write a comprehensive report in markdown with these sections: Summary, Farm Health, Productivity, \
Soil, Market Outlook, Risks, Recommendations. Be specific and base every statement on the data above.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmReportInput {
    pub farm_details: String,
    pub historical_data: String,
    pub soil_quality: String,
    pub market_trends: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmReportOutput {
    pub report: String,
}

pub struct FarmReportFlow {
    ctx: FlowContext,
}

impl FarmReportFlow {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Flow for FarmReportFlow {
    type Input = FarmReportInput;
    type Output = FarmReportOutput;

    fn name(&self) -> &'static str {
        "generate-farm-report"
    }

    fn action_label(&self) -> &'static str {
        "generate farm report"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("farmDetails", Schema::non_empty_string())
                .describe("Size, location and crops grown"),
            Field::new("historicalData", Schema::string()).describe("Yields, costs and weather patterns"),
            Field::new("soilQuality", Schema::string()),
            Field::new("marketTrends", Schema::string()),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![Field::new("report", Schema::non_empty_string())
            .describe("Markdown report")])
    }

    async fn run(&self, input: FarmReportInput, trace: &mut FlowTrace) -> Result<FarmReportOutput> {
        let prompt = REPORT_PROMPT.render(&json!({
            "farmDetails": input.farm_details,
            "historicalData": or_not_provided(&input.historical_data),
            "soilQuality": or_not_provided(&input.soil_quality),
            "marketTrends": or_not_provided(&input.market_trends),
        }))?;

        trace.enter(Stage::ModelInvoke);
        let report = self.ctx.invoker.generate_text(prompt).await?;

        trace.enter(Stage::Assembling);
        let report = report.trim();
        if report.is_empty() {
            return Err(FlowError::ModelOutputInvalid("empty report".to_string()));
        }

        Ok(FarmReportOutput {
            report: report.to_string(),
        })
    }
}

fn or_not_provided(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not provided"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::run_flow;
    use crate::flows::test_support::context_with;
    use crate::models::ModelReply;

    #[tokio::test]
    async fn test_report_prompt_includes_records() {
        let (ctx, mock) = context_with(|_| Ok(ModelReply::text("## Summary\nHealthy paddy.\n")));

        let out = run_flow(
            &FarmReportFlow::new(ctx),
            &json!({
                "farmDetails": "2 acres paddy, Jorhat",
                "historicalData": "",
                "soilQuality": "pH 5.8",
                "marketTrends": "Paddy prices rising"
            }),
        )
        .await
        .unwrap();

        assert_eq!(out["report"], "## Summary\nHealthy paddy.");

        let prompt = mock.requests()[0].prompt_text();
        assert!(prompt.contains("Farm Details: 2 acres paddy, Jorhat"));
        assert!(prompt.contains("Historical Data: Not provided"));
        assert!(mock.requests()[0].response_schema.is_none());
    }
}
