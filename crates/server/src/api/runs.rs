//! # Runs API
//!
//! Stored runs: list them, read one run's state, download its bundle.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use sitesmith_core::export::{zip_bundle, BundleMetadata};
use sitesmith_core::state::RunSummary;
use sitesmith_core::ProjectState;

use super::error::ApiError;
use super::SharedState;

pub fn run_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_runs))
        .route("/:id", get(get_run))
        .route("/:id/bundle.zip", get(download_bundle))
}

/// Newest first
async fn list_runs(State(state): State<SharedState>) -> Result<Json<Vec<RunSummary>>, ApiError> {
    Ok(Json(state.db.list_runs()?))
}

async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectState>, ApiError> {
    state
        .db
        .load_run(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No run with id {}", id)))
}

/// Zip of the generated files; only finished runs have one
async fn download_bundle(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .db
        .run_summary(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("No run with id {}", id)))?;
    let result = state
        .db
        .load_result(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("Run {} has not finished", id)))?;

    let metadata = BundleMetadata::new(summary.request.unwrap_or_default(), Some(id.clone()));
    let bytes = zip_bundle(&result, &metadata)?;
    tracing::debug!(run_id = %id, size = bytes.len(), "Serving bundle");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"sitesmith-{}.zip\"", id),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::pipeline::tests::{json_body, offline_state, run_request};
    use crate::api::router;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use sitesmith_core::state::ProjectState;
    use std::io::Cursor;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_finished_run_is_listed_and_downloadable() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(&dir);

        let response = router(state.clone())
            .oneshot(run_request(r#"{"request": "A bakery landing page"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let run_id = json_body(response).await["runId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = router(state.clone()).oneshot(get("/api/v1/runs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let runs = json_body(response).await;
        assert_eq!(runs[0]["runId"], run_id.as_str());
        assert_eq!(runs[0]["step"], "complete");
        assert_eq!(runs[0]["request"], "A bakery landing page");

        let response = router(state.clone())
            .oneshot(get(&format!("/api/v1/runs/{}", run_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["step"], "complete");

        let response = router(state)
            .oneshot(get(&format!("/api/v1/runs/{}/bundle.zip", run_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        assert!(archive.by_name("metadata.json").is_ok());
        assert!(archive.by_name("frontend/src/app/page.tsx").is_ok());
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(&dir);

        for uri in ["/api/v1/runs/nope", "/api/v1/runs/nope/bundle.zip"] {
            let response = router(state.clone()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_unfinished_run_has_no_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(&dir);
        state
            .db
            .save_run("half-done", Some("A bakery"), &ProjectState::default())
            .unwrap();

        let response = router(state.clone())
            .oneshot(get("/api/v1/runs/half-done"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(state)
            .oneshot(get("/api/v1/runs/half-done/bundle.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
