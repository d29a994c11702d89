//! Farm Advisory Flows
//!
//! Orchestration engine behind a farmer-advisory assistant. Every feature is a
//! flow: input validated against a schema, routed through model and tool calls
//! (sequential or concurrent), output validated before it leaves.
//!
//! FLOW:
//! INPUT → VALIDATE → TOOLS? → MODEL → SPEECH? → ASSEMBLE → VALIDATE → OUTPUT

pub mod api;
pub mod config;
pub mod error;
pub mod flows;
pub mod invoker;
pub mod models;
pub mod prompt;
pub mod registry;
pub mod schema;
pub mod tools;

pub use error::{FlowError, Result};

// Re-export common types
pub use config::AppConfig;
pub use flows::{Flow, FlowContext};
pub use invoker::{GeminiClient, LanguageModel, MockModel, ModelInvoker};
pub use registry::{create_default_registry, FlowRegistry};
