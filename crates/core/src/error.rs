//! # Pipeline Errors
//!
//! Error taxonomy shared by the completion client, the agents, the state
//! store and the orchestrator.
//!
//! Callers only need [`PipelineError::kind`] to tell "the model could not be
//! reached" ([`ErrorKind::Upstream`]) apart from "the model's answer was
//! unusable" ([`ErrorKind::MalformedResponse`] / [`ErrorKind::Validation`]).

use serde::Serialize;

use crate::agents::AgentRole;
use crate::pipeline::PipelineStage;

/// Coarse classification of a [`PipelineError`], taken from its root cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Upstream,
    MalformedResponse,
    Validation,
    State,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Backend unreachable, returned a non-success status, or timed out.
    #[error("Completion backend failed: {0}")]
    Upstream(String),

    /// The completion did not parse into the expected structure.
    #[error("Model returned malformed structured output: {reason}")]
    MalformedResponse {
        reason: String,
        /// The untouched completion text, kept for diagnostics
        raw: String,
    },

    /// The completion parsed but broke the required contract or content policy.
    #[error("Model output failed validation: {0}")]
    Validation(String),

    #[error(transparent)]
    State(#[from] StateError),

    /// Failure raised while a pipeline stage was running.
    #[error("{stage} stage failed ({agent}): {source}")]
    Stage {
        stage: PipelineStage,
        agent: AgentRole,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap this error with the stage and agent that produced it.
    pub fn in_stage(self, stage: PipelineStage, agent: AgentRole) -> Self {
        PipelineError::Stage {
            stage,
            agent,
            source: Box::new(self),
        }
    }

    /// The innermost error, with stage wrappers peeled off.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            PipelineError::Upstream(_) => ErrorKind::Upstream,
            PipelineError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::State(_) => ErrorKind::State,
            PipelineError::Stage { .. } => unreachable!("root() never returns a stage wrapper"),
        }
    }

    /// True when the model answered but the answer cannot be used.
    pub fn is_unusable_output(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedResponse | ErrorKind::Validation
        )
    }

    /// Raw completion text for malformed responses.
    pub fn raw_response(&self) -> Option<&str> {
        match self.root() {
            PipelineError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Errors raised by the project state store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Project state field `{0}` is already set")]
    AlreadySet(&'static str),
}
