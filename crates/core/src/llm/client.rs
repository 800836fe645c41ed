//! Free-text and structured completions on top of a [`CompletionBackend`].

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{CompletionBackend, CompletionRequest};
use crate::error::PipelineError;

/// Temperature for free-text (creative) calls
pub const CREATIVE_TEMPERATURE: f32 = 0.7;
/// Temperature every data-producing agent asks for
pub const STRUCTURED_TEMPERATURE: f32 = 0.2;
/// Structured calls never run hotter than this
pub const STRUCTURED_TEMPERATURE_CEILING: f32 = 0.3;

const STRUCTURED_INSTRUCTION: &str = "IMPORTANT: You must output ONLY valid JSON. \
Do not add markdown blocks, comments, or any text before or after the JSON.";

/// Request/response shim with one parsing step.
///
/// Holds no pipeline state; retry policy belongs to the orchestrator.
pub struct StructuredClient {
    backend: Arc<dyn CompletionBackend>,
    model: String,
}

impl StructuredClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Send both prompts and return the raw completion text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        task_prompt: &str,
        temperature: f32,
    ) -> Result<String, PipelineError> {
        tracing::debug!(model = %self.model, temperature, "Sending completion request");
        self.backend
            .complete(CompletionRequest {
                system_prompt: system_prompt.to_string(),
                user_prompt: task_prompt.to_string(),
                temperature,
                model: self.model.clone(),
            })
            .await
    }

    /// Complete and parse the answer into `T`.
    ///
    /// The system prompt gains a JSON-only instruction plus the schema of
    /// `T`; the temperature is capped at [`STRUCTURED_TEMPERATURE_CEILING`].
    pub async fn complete_structured<T>(
        &self,
        system_prompt: &str,
        task_prompt: &str,
        temperature: f32,
    ) -> Result<T, PipelineError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let system = structured_system_prompt::<T>(system_prompt);
        let raw = self
            .complete(
                &system,
                task_prompt,
                temperature.min(STRUCTURED_TEMPERATURE_CEILING),
            )
            .await?;
        parse_structured(&raw)
    }
}

/// Append the JSON-only instruction and the output schema of `T`.
pub fn structured_system_prompt<T: JsonSchema>(system_prompt: &str) -> String {
    let schema = schemars::schema_for!(T);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "{}\n\n{}\nThe JSON must match this schema:\n{}",
        system_prompt, STRUCTURED_INSTRUCTION, schema_json
    )
}

/// Remove a surrounding markdown code fence, if the model added one.
///
/// Handles an optional info string on the opening fence (```` ```json ````,
/// ```` ``` json ````).
/// Text that does not start with a fence is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .trim_start_matches([' ', '\t'])
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Strip fences and deserialize. Never falls back to a default value.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, PipelineError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| {
        tracing::warn!(
            error = %e,
            preview = %raw.chars().take(120).collect::<String>(),
            "Failed to parse structured completion"
        );
        PipelineError::MalformedResponse {
            reason: e.to_string(),
            raw: raw.to_string(),
        }
    })
}
