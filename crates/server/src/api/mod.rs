//! # HTTP API
//!
//! Axum front door for the pipeline. Every run gets its own row in the
//! state database, keyed by the run id returned to the caller.

pub mod error;
pub mod pipeline;
pub mod runs;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast};

use sitesmith_core::state::StateDb;
use sitesmith_core::{Orchestrator, PipelineConfig, ProgressEvent};

/// Application state
pub struct AppState {
    pub config: PipelineConfig,
    /// Answer with the scripted demo backend instead of a live provider
    pub offline: bool,
    pub db: Arc<StateDb>,
    pub event_tx: broadcast::Sender<ProgressEvent>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: PipelineConfig, db: StateDb, offline: bool) -> Self {
        let (event_tx, _) = broadcast::channel::<ProgressEvent>(100);
        Self {
            config,
            offline,
            db: Arc::new(db),
            event_tx,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        crate::build_orchestrator(self.config.clone(), self.offline)
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/pipeline", pipeline::pipeline_routes())
        .nest("/api/v1/runs", runs::run_routes())
        .route("/api/v1/state", get(pipeline::get_state))
        .route("/api/v1/health", get(pipeline::health))
        .with_state(state)
}

pub async fn serve(state: SharedState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(%addr, "Sitesmith server listening");
    println!("Sitesmith server running at http://{}", addr);
    println!("   Pipeline: /api/v1/pipeline/run (POST), /api/v1/pipeline/events (SSE)");
    println!("   Runs:     /api/v1/runs, /api/v1/runs/:id, /api/v1/runs/:id/bundle.zip");
    println!("   State:    /api/v1/state");
    println!("   Health:   /api/v1/health");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
