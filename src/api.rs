//! REST API server for the advisory flows
//!
//! Stands in for the UI action handlers: every flow is reachable by name and
//! every failure becomes a user-facing message inside the response envelope.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::FlowError;
use crate::flows::audio_advice::{self, AudioAdviceReply};
use crate::registry::FlowRegistry;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<FlowRegistry>,
}

fn status_for(error: &FlowError) -> StatusCode {
    match error {
        FlowError::SchemaViolation { .. } => StatusCode::BAD_REQUEST,
        FlowError::UnknownFlow(_) => StatusCode::NOT_FOUND,
        FlowError::ModelUnavailable(_)
        | FlowError::ModelOutputInvalid(_)
        | FlowError::ToolExecutionError { .. } => StatusCode::BAD_GATEWAY,
        FlowError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_flows(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.registry.names()))
}

async fn invoke_flow(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(input): Json<serde_json::Value>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(flow = %name, "Received flow request");

    let label = state.registry.action_label(&name).unwrap_or("run flow");
    let result = state.registry.invoke(&name, &input).await;

    // The audio flow reports failures as data, not as an error envelope
    if name == audio_advice::FLOW_NAME {
        let reply = AudioAdviceReply::from_result(result, label);
        return (StatusCode::OK, Json(ApiResponse::success(reply)));
    }

    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => {
            warn!(flow = %name, kind = e.kind(), error = %e, "Flow request failed");
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Failed to {}: {}", label, e))),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(registry: Arc<FlowRegistry>) -> Router {
    let state = ApiState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/api/flows", get(list_flows))
        .route("/api/flows/:name", post(invoke_flow))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    registry: Arc<FlowRegistry>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(registry);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::test_support::context_with;
    use crate::models::ModelReply;
    use crate::registry::create_default_registry;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with<F>(handler: F) -> Router
    where
        F: Fn(&crate::models::ModelRequest) -> crate::Result<ModelReply> + Send + Sync + 'static,
    {
        let (ctx, _mock) = context_with(handler);
        create_router(Arc::new(create_default_registry(ctx).unwrap()))
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router_with(|_| Ok(ModelReply::text("unused")))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_flow_success_envelope() {
        let router = router_with(|_| Ok(ModelReply::json(json!({ "advice": "Use neem oil" }))));

        let (status, body) = post_json(
            router,
            "/api/flows/get-crop-advice",
            json!({ "query": "aphids on mustard", "language": "English" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["advice"], "Use neem oil");
    }

    #[tokio::test]
    async fn test_schema_violation_is_bad_request() {
        let router = router_with(|_| Ok(ModelReply::text("unused")));

        let (status, body) = post_json(router, "/api/flows/get-mandi-prices", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to get mandi prices: Schema violation at $.location"));
    }

    #[tokio::test]
    async fn test_unknown_flow_is_not_found() {
        let router = router_with(|_| Ok(ModelReply::text("unused")));
        let (status, _body) = post_json(router, "/api/flows/predict-rainfall", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_model_failure_is_bad_gateway() {
        let router = router_with(|_| Err(FlowError::ModelUnavailable("quota".to_string())));

        let (status, body) = post_json(
            router,
            "/api/flows/get-cattle-advice",
            json!({ "query": "cow not eating", "language": "English" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"],
            "Failed to get cattle advice: Model unavailable: quota"
        );
    }

    #[tokio::test]
    async fn test_audio_flow_failure_is_data() {
        let router = router_with(|_| Err(FlowError::ModelUnavailable("quota".to_string())));

        let (status, body) = post_json(
            router,
            "/api/flows/get-advice-from-audio",
            json!({ "audioDataUri": "data:audio/webm;base64,GkXf", "language": "Hindi" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["transcript"].is_null());
        assert!(body["data"]["advice"].is_null());
        assert_eq!(
            body["data"]["error"],
            "Failed to get advice from audio: Model unavailable: quota"
        );
    }
}
