//! Flow registry
//!
//! Maps flow names to type-erased flows. No business logic lives here.

use crate::error::FlowError;
use crate::flows::{
    AudioAdviceFlow, CattleAdviceFlow, CropAdviceFlow, DiagnosisFlow, DynFlow, FarmReportFlow,
    FlowContext, FormFillerFlow, MandiPricesFlow, WeatherAlertsFlow,
};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: BTreeMap<&'static str, Arc<dyn DynFlow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, flow: Arc<dyn DynFlow>) -> Result<()> {
        let name = flow.name();
        if self.flows.contains_key(name) {
            return Err(FlowError::Configuration(format!(
                "flow '{}' registered twice",
                name
            )));
        }
        self.flows.insert(name, flow);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynFlow>> {
        self.flows.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.flows.keys().copied().collect()
    }

    /// Human action label for error messages, e.g. "get mandi prices"
    pub fn action_label(&self, name: &str) -> Option<&'static str> {
        self.flows.get(name).map(|f| f.action_label())
    }

    pub async fn invoke(&self, name: &str, input: &Value) -> Result<Value> {
        let flow = self
            .get(name)
            .ok_or_else(|| FlowError::UnknownFlow(name.to_string()))?;
        flow.invoke_json(input).await
    }
}

/// Registry with every advisory flow wired to one shared context
pub fn create_default_registry(ctx: FlowContext) -> Result<FlowRegistry> {
    let flows: Vec<Arc<dyn DynFlow>> = vec![
        Arc::new(DiagnosisFlow::plant(ctx.clone())),
        Arc::new(DiagnosisFlow::animal(ctx.clone())),
        Arc::new(AudioAdviceFlow::new(ctx.clone())),
        Arc::new(CropAdviceFlow::new(ctx.clone())),
        Arc::new(CattleAdviceFlow::new(ctx.clone())),
        Arc::new(MandiPricesFlow::new(ctx.clone())?),
        Arc::new(WeatherAlertsFlow::new(ctx.clone())?),
        Arc::new(FormFillerFlow::new(ctx.clone())?),
        Arc::new(FarmReportFlow::new(ctx)),
    ];

    let mut registry = FlowRegistry::new();
    for flow in flows {
        registry.register(flow)?;
    }

    info!(flows = registry.names().len(), "Flow registry initialized");
    Ok(registry)
}
