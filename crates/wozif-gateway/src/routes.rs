use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use wozif_core::error::WozifError;
use wozif_core::types::{ExecutionContext, RunOutput, WorkflowNode};

use crate::auth;
use crate::middleware::Authenticated;
use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, error: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": error.to_string() })))
}

/// Run-fatal errors: bad node configs are the caller's fault, anything
/// else is a collaborator failing.
fn run_error(e: WozifError) -> ApiError {
    if e.is_config_error() {
        api_error(StatusCode::UNPROCESSABLE_ENTITY, e)
    } else {
        api_error(StatusCode::BAD_GATEWAY, e)
    }
}

// GET /api/health: no auth required
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "knowledge_ready": state.knowledge.is_ready().await,
    }))
}

#[derive(Deserialize)]
pub struct ExecuteBody {
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub context: ExecutionContext,
}

// POST /execute: requires Operator+
pub async fn execute(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<RunOutput>, ApiError> {
    if !auth::has_operator_access(auth_result.role) {
        return Err(api_error(StatusCode::FORBIDDEN, "operator role required"));
    }

    info!(caller = %auth_result.name, nodes = body.nodes.len(), "Workflow run requested");
    match state.executor.run(&body.nodes, body.context).await {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            warn!(error = %e, "Workflow run aborted");
            Err(run_error(e))
        }
    }
}

// POST /api/knowledge/reload: requires Admin
pub async fn reload_knowledge(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    if !auth::has_admin_access(auth_result.role) {
        return Err(api_error(StatusCode::FORBIDDEN, "admin role required"));
    }

    let chunks = state
        .knowledge
        .reload()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    info!(caller = %auth_result.name, chunks, "Knowledge base reloaded");
    Ok(Json(json!({
        "chunks": chunks,
        "ready": state.knowledge.is_ready().await,
    })))
}
