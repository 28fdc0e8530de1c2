//! HTTP surface: `POST /api/chat` and `GET /health`.

pub mod chat;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::AgentConfig;
use crate::inference::ChatModel;
use crate::tools::{tool_definitions, ToolContext, ToolDefinition};

/// Shared, read-only state built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub model: Arc<dyn ChatModel>,
    pub tools: Arc<ToolContext>,
    pub definitions: Arc<Vec<ToolDefinition>>,
}

impl AppState {
    pub fn new(config: AgentConfig, model: Arc<dyn ChatModel>, tools: ToolContext) -> Self {
        Self {
            config: Arc::new(config),
            model,
            tools: Arc::new(tools),
            definitions: Arc::new(tool_definitions()),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new().route("/chat", post(chat::chat_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.config.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("HTTP server listening on {}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}
