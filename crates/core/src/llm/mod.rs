//! # Structured-Completion Client
//!
//! ```text
//! Agent ──► StructuredClient ──► CompletionBackend (HTTP / scripted)
//!              │
//!              └── complete_structured: instruction + low temperature
//!                  + fence stripping + typed parse
//! ```
//!
//! Backends only move text. Everything that turns text into typed values
//! lives in [`client`], so the parsing rules are identical for every
//! provider and for the scripted test backend.

pub mod client;
pub mod http;
pub mod mock;

pub use client::{parse_structured, strip_code_fences, StructuredClient};
pub use http::HttpBackend;
pub use mock::ScriptedBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One completion call as seen by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub model: String,
}

/// Raw text-completion transport.
///
/// Implementations surface transport failures and timeouts as
/// [`PipelineError::Upstream`] and never retry on their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError>;
}
