//! Error types for the farm advisory flows

use thiserror::Error;

/// Result type alias for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {

    // =============================
    // Flow Taxonomy
    // =============================

    #[error("Schema violation at {path}: expected {expected}, found {actual}")]
    SchemaViolation {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model output invalid: {0}")]
    ModelOutputInvalid(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    // =============================
    // Registry & Startup
    // =============================

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FlowError {
    pub fn schema(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        FlowError::SchemaViolation {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::ToolExecutionError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Stable tag for logs and API envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::SchemaViolation { .. } => "schema_violation",
            FlowError::ModelUnavailable(_) => "model_unavailable",
            FlowError::ModelOutputInvalid(_) => "model_output_invalid",
            FlowError::ToolExecutionError { .. } => "tool_execution_error",
            FlowError::UnknownFlow(_) => "unknown_flow",
            FlowError::Configuration(_) => "configuration",
        }
    }
}
