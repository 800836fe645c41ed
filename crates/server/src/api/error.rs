//! Handler error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sitesmith_core::{ErrorKind, PipelineError};

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

/// Status for a failed run: the model could not be reached (502) or its
/// answer was unusable (422)
pub fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err.kind() {
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::MalformedResponse | ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::State => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Pipeline(err) => {
                let (stage, agent) = match err {
                    PipelineError::Stage { stage, agent, .. } => (Some(*stage), Some(*agent)),
                    _ => (None, None),
                };
                (
                    pipeline_status(err),
                    json!({
                        "error": err.to_string(),
                        "kind": err.kind(),
                        "stage": stage,
                        "agent": agent,
                        "rawResponse": err.raw_response(),
                    }),
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "kind": "bad_request" }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": msg, "kind": "not_found" }),
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": format!("{:#}", err), "kind": "internal" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesmith_core::agents::AgentRole;
    use sitesmith_core::pipeline::PipelineStage;

    #[test]
    fn test_pipeline_status_mapping() {
        let upstream = PipelineError::Upstream("timed out".to_string())
            .in_stage(PipelineStage::Building, AgentRole::Backend);
        assert_eq!(pipeline_status(&upstream), StatusCode::BAD_GATEWAY);

        let malformed = PipelineError::MalformedResponse {
            reason: "expected value".to_string(),
            raw: "Here is your design!".to_string(),
        };
        assert_eq!(pipeline_status(&malformed), StatusCode::UNPROCESSABLE_ENTITY);

        let invalid = PipelineError::Validation("score 140 exceeds 100".to_string());
        assert_eq!(pipeline_status(&invalid), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_body_carries_kind_and_stage() {
        let err = PipelineError::MalformedResponse {
            reason: "expected value".to_string(),
            raw: "Here is your design!".to_string(),
        }
        .in_stage(PipelineStage::Designing, AgentRole::Designer);

        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "malformed_response");
        assert_eq!(body["stage"], "designing");
        assert_eq!(body["agent"], "ui");
        assert_eq!(body["rawResponse"], "Here is your design!");
    }
}
