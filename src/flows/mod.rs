//! Flow orchestration
//!
//! A flow is a typed request/response pipeline: input schema, output schema
//! and a procedure composing model and tool calls. The runner in this module
//! owns both validation passes and drives the stage state machine; flows only
//! report the stages they enter through a `FlowTrace`.

use crate::config::AppConfig;
use crate::error::FlowError;
use crate::invoker::ModelInvoker;
use crate::schema::{self, Schema};
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod advice;
pub mod audio_advice;
pub mod diagnose;
pub mod farm_report;
pub mod form_filler;
pub mod format;
pub mod gather;
pub mod mandi;
pub mod weather;

pub use advice::{CattleAdviceFlow, CropAdviceFlow};
pub use audio_advice::{AudioAdviceFlow, AudioAdviceReply};
pub use diagnose::{DiagnosisFlow, DiagnosisOutput};
pub use farm_report::FarmReportFlow;
pub use form_filler::FormFillerFlow;
pub use gather::gather_with_fallback;
pub use mandi::MandiPricesFlow;
pub use weather::WeatherAlertsFlow;

/// Shared, read-only dependencies handed to every flow at construction
#[derive(Clone)]
pub struct FlowContext {
    pub invoker: Arc<ModelInvoker>,
    pub config: Arc<AppConfig>,
}

impl FlowContext {
    pub fn new(invoker: Arc<ModelInvoker>, config: Arc<AppConfig>) -> Self {
        Self { invoker, config }
    }
}

//
// ================= State Machine =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    ToolFetch,
    ModelInvoke,
    SecondaryModelInvoke,
    Assembling,
    Validated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::ToolFetch => "tool_fetch",
            Stage::ModelInvoke => "model_invoke",
            Stage::SecondaryModelInvoke => "secondary_model_invoke",
            Stage::Assembling => "assembling",
            Stage::Validated => "validated",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Running(Stage),
    Completed,
    Rejected,
    Failed(Stage),
}

/// Per-invocation record of the stages a flow went through
#[derive(Debug)]
pub struct FlowTrace {
    pub invocation_id: Uuid,
    flow: &'static str,
    stages: Vec<Stage>,
    state: FlowState,
    started: Instant,
}

impl FlowTrace {
    pub fn new(flow: &'static str) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            flow,
            stages: vec![Stage::Validating],
            state: FlowState::Running(Stage::Validating),
            started: Instant::now(),
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        if self.stages.last() != Some(&stage) {
            debug!(
                flow = self.flow,
                invocation_id = %self.invocation_id,
                %stage,
                "Entering stage"
            );
            self.stages.push(stage);
        }
        self.state = FlowState::Running(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    fn current_stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Validating)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn stage_history(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

//
// ================= Flow Trait =================
//

/// Trait for a single typed flow
#[async_trait]
pub trait Flow: Send + Sync {
    type Input: Serialize + DeserializeOwned + Send;
    type Output: Serialize + DeserializeOwned + Send;

    fn name(&self) -> &'static str;

    /// Lowercase verb phrase for error messages ("diagnose plant disease")
    fn action_label(&self) -> &'static str;

    fn input_schema(&self) -> Schema;
    fn output_schema(&self) -> Schema;

    /// Procedure body. Receives already-validated input.
    async fn run(&self, input: Self::Input, trace: &mut FlowTrace) -> Result<Self::Output>;
}

/// Run a flow on raw JSON: validate input, run, validate output
pub async fn run_flow<F: Flow>(flow: &F, input: &Value) -> Result<Value> {
    let mut trace = FlowTrace::new(Flow::name(flow));

    info!(
        flow = Flow::name(flow),
        invocation_id = %trace.invocation_id,
        "Flow started"
    );

    let typed: F::Input = match schema::validate_into(&flow.input_schema(), input) {
        Ok(typed) => typed,
        Err(e) => {
            trace.state = FlowState::Rejected;
            warn!(
                flow = Flow::name(flow),
                invocation_id = %trace.invocation_id,
                error = %e,
                "Flow input rejected"
            );
            return Err(e);
        }
    };

    let result = match flow.run(typed, &mut trace).await {
        Ok(output) => {
            trace.enter(Stage::Validated);
            schema::validate_typed(&flow.output_schema(), &output)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => {
            trace.state = FlowState::Completed;
            info!(
                flow = Flow::name(flow),
                invocation_id = %trace.invocation_id,
                elapsed_ms = trace.elapsed_ms(),
                stages = %trace.stage_history(),
                "Flow completed"
            );
            Ok(value)
        }
        Err(e) => {
            let stage = trace.current_stage();
            trace.state = FlowState::Failed(stage);
            warn!(
                flow = Flow::name(flow),
                invocation_id = %trace.invocation_id,
                %stage,
                kind = e.kind(),
                error = %e,
                elapsed_ms = trace.elapsed_ms(),
                "Flow failed"
            );
            Err(e)
        }
    }
}

/// Typed entry point with the same runner semantics
pub async fn invoke<F: Flow>(flow: &F, input: F::Input) -> Result<F::Output> {
    let raw = serde_json::to_value(&input)
        .map_err(|e| FlowError::schema("$", "serializable input", e.to_string()))?;
    let output = run_flow(flow, &raw).await?;
    serde_json::from_value(output)
        .map_err(|e| FlowError::schema("$", "flow output type", e.to_string()))
}

/// Type-erased flow: JSON in, JSON out
#[async_trait]
pub trait DynFlow: Send + Sync {
    fn name(&self) -> &'static str;
    fn action_label(&self) -> &'static str;
    async fn invoke_json(&self, input: &Value) -> Result<Value>;
}

#[async_trait]
impl<F: Flow> DynFlow for F {
    fn name(&self) -> &'static str {
        Flow::name(self)
    }

    fn action_label(&self) -> &'static str {
        Flow::action_label(self)
    }

    async fn invoke_json(&self, input: &Value) -> Result<Value> {
        run_flow(self, input).await
    }
}
