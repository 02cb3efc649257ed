//! # Pipeline API
//!
//! `POST /api/v1/pipelines` runs a specification to completion and stores the
//! artifact; `GET /api/v1/pipelines/:agent_id` reads a stored artifact back.

use super::AppState;
use crate::store::{self, AGENT_FILE_STEM, PROMPT_FILE};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use kiln_core::state::{PipelineOutcome, Specification};
use kiln_core::swarm::Coordinator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePipelineRequest {
    #[serde(flatten)]
    pub specification: Specification,
    /// Directory name for stored files; generated when absent
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CreatePipelineResponse {
    pub pipeline_id: Uuid,
    pub agent_id: String,
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
    /// Paths written to the artifact store
    pub stored: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_pipeline))
        .route("/:agent_id", get(get_artifact))
}

/// Run one pipeline
async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipelineRequest>,
) -> (StatusCode, Json<Value>) {
    let agent_id = req
        .agent_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel = state.shutdown.child_token();

    let run = match req.timeout_secs {
        Some(secs) => {
            state
                .coordinator
                .run_with_timeout(req.specification, Duration::from_secs(secs), cancel)
                .await
        }
        None => state.coordinator.execute(req.specification, cancel).await,
    };
    let pipeline_id = run.id;
    let events = run.events.clone();
    let outcome = Coordinator::into_outcome(run);

    let mut stored = Vec::new();
    if let Some(artifact) = outcome.artifact() {
        let extension = state.coordinator.config().source_extension();
        match store::persist_artifact(state.store.as_ref(), &agent_id, extension, artifact).await {
            Ok(paths) => stored.extend(paths),
            Err(e) => {
                tracing::error!(%agent_id, error = %e, "failed to store artifact");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("failed to store artifact: {e}") })),
                );
            }
        }
    }
    match store::persist_events(state.store.as_ref(), &agent_id, &events).await {
        Ok(path) => stored.push(path),
        Err(e) => tracing::warn!(%agent_id, error = %e, "failed to store audit log"),
    }

    let status = match outcome.failure() {
        None => StatusCode::OK,
        Some(failure) if failure.kind.is_infrastructure() => StatusCode::SERVICE_UNAVAILABLE,
        Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    tracing::info!(%agent_id, %pipeline_id, classification = outcome.classification(), "pipeline request finished");

    let response = CreatePipelineResponse {
        pipeline_id,
        agent_id,
        outcome,
        stored,
    };
    match serde_json::to_value(&response) {
        Ok(body) => (status, Json(body)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Read a stored artifact
async fn get_artifact(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let extension = state.coordinator.config().source_extension();
    let code = state
        .store
        .get(&format!("{agent_id}/{AGENT_FILE_STEM}.{extension}"))
        .await;
    let prompt = state.store.get(&format!("{agent_id}/{PROMPT_FILE}")).await;

    match (code, prompt) {
        (Ok(code), Ok(prompt)) => (
            StatusCode::OK,
            Json(json!({
                "agent_id": agent_id,
                "code": String::from_utf8_lossy(&code),
                "prompt": String::from_utf8_lossy(&prompt),
            })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no artifact stored for '{agent_id}'") })),
        ),
    }
}
