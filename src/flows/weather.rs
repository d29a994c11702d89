//! Weather, subsidy and news alerts with a five day forecast
//!
//! Weather and subsidy data are required context for the model; news is
//! best-effort and, when available, its alerts are listed first.

use super::{Flow, FlowContext, FlowTrace, Stage};
use crate::error::FlowError;
use crate::invoker::ModelCall;
use crate::prompt::PromptSpec;
use crate::schema::{Field, Schema};
use crate::tools::weather::FORECAST_DAYS;
use crate::tools::{AgriNewsTool, SubsidySchemesTool, ToolRegistry, WeatherForecastTool};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const ALERT_ICONS: &[&str] = &[
    "CloudDrizzle",
    "CloudLightning",
    "CircleDollarSign",
    "Sun",
    "Wind",
    "Cloudy",
    "Bug",
    NEWS_ICON,
];

/// Icons the model may pick; news alerts only come from the news feed
const MODEL_ALERT_ICONS: &[&str] = &[
    "CloudDrizzle",
    "CloudLightning",
    "CircleDollarSign",
    "Sun",
    "Wind",
    "Cloudy",
    "Bug",
];

const NEWS_ICON: &str = "Newspaper";

pub const FORECAST_ICONS: &[&str] = &["CloudDrizzle", "CloudLightning", "Sun", "Cloudy", "Wind"];

const NEWS_COLOR: &str = "text-gray-600";

const ALERTS_PROMPT: PromptSpec = PromptSpec::new(
    "weather_alerts",
    "You are a helpful assistant for farmers in India. Generate realistic, localized alerts and a \
5-day weather forecast for the farmer's location.

Location: {{location}}

Weather outlook (from the forecast service, day 0 is today):
{{weather}}

Government schemes currently relevant:
{{schemes}}

Generate the following:
1. A 5-day weather forecast, one entry per day starting today, consistent with the outlook above.
   - day: \"Today\", \"Tomorrow\", then weekday names.
   - icon: one of \"CloudDrizzle\", \"CloudLightning\", \"Sun\", \"Cloudy\", \"Wind\".
   - title: a short condition such as 'Light Rain'.
   - description: a brief description in the local language of the location and in English.
2. A list of 2-3 alerts (excluding news): a mix of weather warnings, active subsidies from the \
list above, and pest threats relevant to agriculture at this location.
   - icon: \"CloudDrizzle\" (rain), \"CloudLightning\" (storms), \"CircleDollarSign\" (subsidy), \
\"Sun\" (heat), \"Wind\", \"Cloudy\" or \"Bug\" (pests).
   - color: a Tailwind CSS text color class suited to the alert type (e.g. 'text-blue-500').
   - time: when the alert was issued (e.g. '2 hours ago') or 'Ongoing'.
   - description: in the local language and in English.",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherInput {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub time: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastDay {
    pub day: String,
    pub icon: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherOutput {
    pub alerts: Vec<Alert>,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: String,
    description: String,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct NewsData {
    articles: Vec<Article>,
}

fn alert_schema(icons: &[&str]) -> Schema {
    Schema::object(vec![
        Field::new("icon", Schema::enumeration(icons)),
        Field::new("title", Schema::non_empty_string()),
        Field::new("description", Schema::non_empty_string()),
        Field::new("time", Schema::non_empty_string()).describe("e.g. '2 hours ago' or 'Ongoing'"),
        Field::new("color", Schema::non_empty_string()).describe("Tailwind CSS text color class"),
    ])
}

fn forecast_day_schema() -> Schema {
    Schema::object(vec![
        Field::new("day", Schema::non_empty_string()),
        Field::new("icon", Schema::enumeration(FORECAST_ICONS)),
        Field::new("title", Schema::non_empty_string()),
        Field::new("description", Schema::non_empty_string()),
    ])
}

/// `Today`, `Tomorrow`, then the weekday name
pub fn day_label(today: NaiveDate, offset: u64) -> String {
    match offset {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        n => {
            let date = today.checked_add_days(Days::new(n)).unwrap_or(today);
            weekday_name(date.weekday()).to_string()
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn news_alert(article: Article) -> Alert {
    let time = DateTime::parse_from_rfc3339(&article.published_at)
        .map(|t| t.format("%d %b %Y").to_string())
        .unwrap_or_else(|_| "Recent".to_string());

    Alert {
        icon: NEWS_ICON.to_string(),
        title: article.title,
        description: article.description,
        time,
        color: NEWS_COLOR.to_string(),
    }
}

pub struct WeatherAlertsFlow {
    ctx: FlowContext,
    tools: Arc<ToolRegistry>,
}

impl WeatherAlertsFlow {
    pub fn new(ctx: FlowContext) -> Result<Self> {
        let news = AgriNewsTool::new(ctx.config.news_api_key.clone());
        Self::with_news(ctx, news)
    }

    pub fn with_news(ctx: FlowContext, news: AgriNewsTool) -> Result<Self> {
        let tools = ToolRegistry::with_tools(vec![
            Arc::new(WeatherForecastTool),
            Arc::new(SubsidySchemesTool),
            Arc::new(news),
        ])?;

        Ok(Self::with_registry(ctx, tools))
    }

    /// Expects tools named like the weather, subsidy and news tools
    pub fn with_registry(ctx: FlowContext, tools: ToolRegistry) -> Self {
        Self {
            ctx,
            tools: Arc::new(tools),
        }
    }

    fn model_schema() -> Schema {
        Schema::object(vec![
            Field::new(
                "forecast",
                Schema::array_bounded(forecast_day_schema(), Some(FORECAST_DAYS), None),
            )
            .describe("5-day forecast starting today"),
            Field::new("alerts", Schema::array(alert_schema(MODEL_ALERT_ICONS))),
        ])
    }

    /// Best-effort: a news failure only costs the news alerts
    async fn news_alerts(&self, location: &str) -> Vec<Alert> {
        let query = format!("agriculture pests schemes diseases {}", location);

        let result = self
            .tools
            .invoke(AgriNewsTool::NAME, &json!({ "query": query, "pageSize": 3 }))
            .await
            .and_then(|raw| {
                serde_json::from_value::<NewsData>(raw)
                    .map_err(|e| FlowError::tool(AgriNewsTool::NAME, e.to_string()))
            });

        match result {
            Ok(news) => news.articles.into_iter().map(news_alert).collect(),
            Err(e) => {
                warn!(flow = Flow::name(self), error = %e, "News unavailable, continuing without");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Flow for WeatherAlertsFlow {
    type Input = WeatherInput;
    type Output = WeatherOutput;

    fn name(&self) -> &'static str {
        "get-weather-alerts"
    }

    fn action_label(&self) -> &'static str {
        "get weather alerts"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![Field::new("location", Schema::non_empty_string())])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("alerts", Schema::array(alert_schema(ALERT_ICONS))),
            Field::new(
                "forecast",
                Schema::array_bounded(forecast_day_schema(), Some(FORECAST_DAYS), Some(FORECAST_DAYS)),
            ),
        ])
    }

    async fn run(&self, input: WeatherInput, trace: &mut FlowTrace) -> Result<WeatherOutput> {
        trace.enter(Stage::ToolFetch);
        let location = json!({ "location": input.location });

        let (weather, schemes, news) = tokio::join!(
            self.tools.invoke(WeatherForecastTool::NAME, &location),
            self.tools.invoke(SubsidySchemesTool::NAME, &location),
            self.news_alerts(&input.location),
        );
        let weather = weather?;
        let schemes = schemes?;
        debug!(news_alerts = news.len(), "Tool data fetched");

        trace.enter(Stage::ModelInvoke);
        let prompt = ALERTS_PROMPT.render(&json!({
            "location": input.location,
            "weather": pretty(&weather["days"]),
            "schemes": pretty(&schemes["schemes"]),
        }))?;
        let generated: WeatherOutput = self
            .ctx
            .invoker
            .structured(ModelCall::new(prompt).with_schema(Self::model_schema()))
            .await?;

        trace.enter(Stage::Assembling);
        let today = Local::now().date_naive();
        let forecast = generated
            .forecast
            .into_iter()
            .take(FORECAST_DAYS)
            .enumerate()
            .map(|(offset, day)| ForecastDay {
                day: day_label(today, offset as u64),
                ..day
            })
            .collect();

        let mut alerts = news;
        alerts.extend(generated.alerts);

        Ok(WeatherOutput { alerts, forecast })
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
