//! Mandi price prediction
//!
//! Quotes come from the market data tool up front; one prediction call per
//! commodity then runs concurrently. A failed prediction falls back to the
//! current price with a neutral trend, so the list always has one entry per
//! quote.

use super::format::format_price;
use super::gather::gather_with_fallback;
use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::error::FlowError;
use crate::invoker::ModelCall;
use crate::models::Trend;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::tools::market::CommodityQuote;
use crate::tools::{MarketDataTool, ToolRegistry};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const FALLBACK_JUSTIFICATION: &str = "AI prediction failed, showing current price.";

const PREDICTION_PROMPT: PromptSpec = PromptSpec::new(
    "price_prediction",
    "You are an expert agricultural market analyst.
Given the current price for \"{{commodity}}\" in the \"{{market}}\" market, predict next week's price.
- Current Price: {{currentPrice}} per {{unit}}
Provide a numerical price prediction in the same unit, a brief one-sentence justification \
considering general market factors, and the trend. Make a reasonable prediction based on typical \
market behavior.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandiInput {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommodityPrice {
    pub commodity: String,
    pub market: String,
    pub price: String,
    pub prediction: String,
    pub justification: String,
    pub trend: Trend,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MandiOutput {
    pub prices: Vec<CommodityPrice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Prediction {
    prediction: f64,
    justification: String,
    trend: Trend,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    quotes: Vec<CommodityQuote>,
}

pub struct MandiPricesFlow {
    ctx: FlowContext,
    tools: Arc<ToolRegistry>,
}

impl MandiPricesFlow {
    pub fn new(ctx: FlowContext) -> Result<Self> {
        let tools = ToolRegistry::with_tools(vec![Arc::new(MarketDataTool)])?;
        Ok(Self {
            ctx,
            tools: Arc::new(tools),
        })
    }

    fn prediction_schema() -> Schema {
        Schema::object(vec![
            Field::new("prediction", Schema::number_min(0.0))
                .describe("Predicted price for next week as a raw number"),
            Field::new("justification", Schema::non_empty_string())
                .describe("One-sentence justification for the prediction"),
            Field::new("trend", Schema::enumeration(&Trend::VARIANTS)),
        ])
    }

    async fn predict(&self, quote: &CommodityQuote) -> Result<Prediction> {
        let prompt = PREDICTION_PROMPT.render(&json!({
            "commodity": quote.commodity,
            "market": quote.market,
            "currentPrice": quote.price,
            "unit": quote.unit,
        }))?;

        self.ctx
            .invoker
            .structured(ModelCall::new(prompt).with_schema(Self::prediction_schema()))
            .await
    }
}

fn fallback(quote: &CommodityQuote) -> Prediction {
    Prediction {
        prediction: quote.price,
        justification: FALLBACK_JUSTIFICATION.to_string(),
        trend: Trend::Stable,
    }
}

#[async_trait]
impl Flow for MandiPricesFlow {
    type Input = MandiInput;
    type Output = MandiOutput;

    fn name(&self) -> &'static str {
        "get-mandi-prices"
    }

    fn action_label(&self) -> &'static str {
        "get mandi prices"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("location", Schema::non_empty_string()).describe("State or district, e.g. 'Assam'"),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![Field::new(
            "prices",
            Schema::array(Schema::object(vec![
                Field::new("commodity", Schema::non_empty_string()),
                Field::new("market", Schema::non_empty_string()),
                Field::new("price", Schema::non_empty_string())
                    .describe("Current price as 'Rupees X,XXX / Unit'"),
                Field::new("prediction", Schema::non_empty_string()),
                Field::new("justification", Schema::non_empty_string()),
                Field::new("trend", Schema::enumeration(&Trend::VARIANTS)),
                Field::new("unit", Schema::non_empty_string()),
            ])),
        )])
    }

    async fn run(&self, input: MandiInput, trace: &mut FlowTrace) -> Result<MandiOutput> {
        trace.enter(Stage::ToolFetch);
        let raw = self
            .tools
            .invoke(MarketDataTool::NAME, &json!({ "location": input.location }))
            .await?;
        let market: MarketData = serde_json::from_value(raw)
            .map_err(|e| FlowError::tool(MarketDataTool::NAME, format!("unexpected output: {}", e)))?;

        trace.enter(Stage::ModelInvoke);
        let predictions =
            gather_with_fallback(&market.quotes, |quote| self.predict(quote), fallback).await;

        trace.enter(Stage::Assembling);
        let prices = market
            .quotes
            .iter()
            .zip(predictions)
            .map(|(quote, p)| CommodityPrice {
                commodity: quote.commodity.clone(),
                market: quote.market.clone(),
                price: format_price(quote.price, &quote.unit),
                prediction: format_price(p.prediction, &quote.unit),
                justification: p.justification,
                trend: p.trend,
                unit: quote.unit.clone(),
            })
            .collect();

        Ok(MandiOutput { prices })
    }
}
