//! # Pipeline API
//!
//! Start a run, follow its progress over SSE, read back the latest state.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use sitesmith_core::state::SqliteSink;
use sitesmith_core::{PipelineResult, ProgressEvent, ProjectState, ProjectStore};

use super::error::ApiError;
use super::SharedState;

const HEARTBEAT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub request: String,
}

/// A finished run: its id plus the pipeline result fields
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub run_id: String,
    #[serde(flatten)]
    pub result: PipelineResult,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub offline: bool,
}

pub fn pipeline_routes() -> Router<SharedState> {
    Router::new()
        .route("/run", post(run_pipeline))
        .route("/events", get(events))
}

/// Run the whole pipeline and answer with its result
async fn run_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    if req.request.trim().is_empty() {
        return Err(ApiError::BadRequest("request must not be empty".to_string()));
    }

    // Bridge this run's events to every SSE subscriber
    let (event_mpsc_tx, mut event_mpsc_rx) = mpsc::channel::<ProgressEvent>(100);
    let broadcast_tx = state.event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = event_mpsc_rx.recv().await {
            let _ = broadcast_tx.send(event);
        }
    });

    let sink = SqliteSink::for_request(state.db.clone(), &req.request);
    let run_id = sink.run_id().to_string();
    let mut orchestrator = state.orchestrator().with_event_channel(event_mpsc_tx);
    let mut store = ProjectStore::new(Arc::new(sink));

    let result = orchestrator.run_pipeline(&req.request, &mut store).await?;
    if let Err(e) = state.db.save_result(&run_id, &result) {
        tracing::warn!(run_id = %run_id, error = %e, "Failed to store run result");
    }
    tracing::info!(run_id = %run_id, message = %result.message, "Run finished");
    Ok(Json(RunResponse { run_id, result }))
}

/// SSE endpoint for progress events with heartbeat
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().event("progress").data(json)), rx))
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "SSE subscriber fell behind");
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Ok(Err(RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// State of the most recently written run
pub async fn get_state(State(state): State<SharedState>) -> Result<Json<ProjectState>, ApiError> {
    match state.db.latest_run()? {
        Some((_, project)) => Ok(Json(project)),
        None => Err(ApiError::NotFound("No runs stored yet".to_string())),
    }
}

pub async fn health(State(state): State<SharedState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        offline: state.offline,
    })
}
