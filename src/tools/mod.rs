//! Tool trait and registry
//!
//! Tools are schema-bounded, stateless data fetchers. They are invoked either
//! by flow code directly or by the model through the invoker's tool loop.
//! Every invocation is validated on the way in and on the way out.

use crate::error::FlowError;
use crate::models::ToolDeclaration;
use crate::schema::{self, Schema};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub mod forms;
pub mod market;
pub mod news;
pub mod subsidy;
pub mod weather;

pub use forms::FormCatalogTool;
pub use market::MarketDataTool;
pub use news::AgriNewsTool;
pub use subsidy::SubsidySchemesTool;
pub use weather::WeatherForecastTool;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read by the model when deciding whether to call the tool
    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Schema;
    fn output_schema(&self) -> Schema;

    async fn execute(&self, input: &Value) -> Result<Value>;
}

/// Named tool set owned by a flow
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(FlowError::Configuration(format!(
                "tool '{}' registered twice",
                name
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .values()
            .map(|tool| ToolDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.input_schema(),
            })
            .collect()
    }

    /// Validate input, execute, validate output.
    ///
    /// Input violations surface as `SchemaViolation`; anything that goes
    /// wrong after that is a `ToolExecutionError`.
    pub async fn invoke(&self, name: &str, input: &Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| FlowError::tool(name, "tool not registered"))?;

        let input = schema::validate(&tool.input_schema(), input)?;

        let start = Instant::now();
        let output = tool.execute(&input).await.map_err(|e| {
            warn!(tool = name, error = %e, "Tool execution failed");
            match e {
                FlowError::ToolExecutionError { .. } => e,
                other => FlowError::tool(name, other.to_string()),
            }
        })?;

        let output = schema::validate(&tool.output_schema(), &output)
            .map_err(|e| FlowError::tool(name, format!("invalid output: {}", e)))?;

        debug!(
            tool = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );

        Ok(output)
    }
}

/// Lowercased, alphanumeric-only key used for fuzzy catalog lookups
pub(crate) fn normalize_key(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
