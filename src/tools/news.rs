//! Agricultural news headlines via NewsAPI
//!
//! Uses a long-lived reqwest::Client. Without a configured key the tool
//! still registers but every call fails with a ToolExecutionError.

use super::Tool;
use crate::error::FlowError;
use crate::schema::{Field, Schema};
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
const DEFAULT_PAGE_SIZE: i64 = 3;

#[derive(Clone)]
struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    fn new(api_key: String, base_url: String) -> Option<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(15))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn everything(&self, query: &str, page_size: i64) -> Result<NewsApiResponse> {
        let page_size = page_size.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("apiKey", self.api_key.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FlowError::tool(AgriNewsTool::NAME, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::tool(
                AgriNewsTool::NAME,
                format!("news API returned {}: {}", status, body),
            ));
        }

        response
            .json::<NewsApiResponse>()
            .await
            .map_err(|e| FlowError::tool(AgriNewsTool::NAME, format!("invalid JSON response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    source: Option<NewsApiSource>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

pub struct AgriNewsTool {
    api: Option<NewsApiClient>,
}

impl AgriNewsTool {
    pub const NAME: &'static str = "agri_news";

    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, NEWS_API_URL.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        let api = api_key
            .filter(|k| !k.trim().is_empty())
            .and_then(|k| NewsApiClient::new(k, base_url));
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for AgriNewsTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Fetch the latest agriculture news headlines (pests, schemes, diseases) for a query"
    }

    fn input_schema(&self) -> Schema {
        Schema::object(vec![
            Field::new("query", Schema::non_empty_string()),
            Field::new("pageSize", Schema::integer().optional()),
        ])
    }

    fn output_schema(&self) -> Schema {
        Schema::object(vec![Field::new(
            "articles",
            Schema::array(Schema::object(vec![
                Field::new("title", Schema::non_empty_string()),
                Field::new("description", Schema::string()),
                Field::new("publishedAt", Schema::string()),
                Field::new("source", Schema::string()),
            ])),
        )])
    }

    async fn execute(&self, input: &Value) -> Result<Value> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| FlowError::tool(Self::NAME, "NEWS_API_KEY is not configured"))?;

        let query = input["query"].as_str().unwrap_or_default();
        let page_size = input
            .get("pageSize")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let response = api.everything(query, page_size).await?;

        // Articles without a title carry nothing worth alerting on
        let articles: Vec<Value> = response
            .articles
            .into_iter()
            .filter_map(|a| {
                let title = a.title.filter(|t| !t.trim().is_empty())?;
                Some(json!({
                    "title": title,
                    "description": a
                        .description
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or_else(|| "No description available.".to_string()),
                    "publishedAt": a.published_at.unwrap_or_default(),
                    "source": a.source.and_then(|s| s.name).unwrap_or_default(),
                }))
            })
            .collect();

        Ok(json!({ "articles": articles }))
    }
}
