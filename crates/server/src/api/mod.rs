//! # HTTP API
//!
//! One coordinator (and so one gateway call pool) shared by every request.
//! Each request runs its own pipeline; concurrent requests only contend for
//! gateway slots.

pub mod pipeline;

use crate::store::ArtifactStore;
use axum::{routing::get, Json, Router};
use kiln_core::swarm::Coordinator;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub store: Arc<dyn ArtifactStore>,
    /// Cancelled on shutdown; every run gets a child token
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/pipelines", pipeline::routes())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "kiln server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down, cancelling running pipelines");
            }
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
