use farm_advisory_flows::{
    api::start_server, create_default_registry, AppConfig, FlowContext, GeminiClient,
    LanguageModel, MockModel, ModelInvoker,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    info!("Farm Advisory Flows - API Server");
    info!("Port: {}", config.port);

    let backend: Arc<dyn LanguageModel> = match &config.gemini_api_key {
        Some(key) => {
            info!(model = %config.model, "Using Gemini backend");
            Arc::new(GeminiClient::new(key.clone())?)
        }
        None => {
            warn!("GEMINI_API_KEY not set, serving sample answers from the offline model");
            Arc::new(MockModel::offline())
        }
    };

    let invoker = Arc::new(ModelInvoker::from_config(backend, &config));
    let registry = Arc::new(create_default_registry(FlowContext::new(invoker, config.clone()))?);

    info!(flows = ?registry.names(), "Flows registered");

    start_server(registry, config.port).await?;

    Ok(())
}
