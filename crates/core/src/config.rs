//! # Pipeline Configuration
//!
//! Read from `.sitesmith/config.json` (every field optional):
//!
//! ```json
//! {
//!   "global_provider": "anthropic",
//!   "global_model": "claude-sonnet-4-20250514",
//!   "per_agent_models": { "writer": "claude-3-5-haiku-20241022" },
//!   "personas": { "qa": { "name": "Release Gatekeeper" } },
//!   "max_concurrent_calls": 4,
//!   "retry_malformed": true,
//!   "remediation": false,
//!   "content_policy": "reject_empty"
//! }
//! ```
//!
//! Per-agent maps are keyed by role id (`pm`, `ui`, `frontend`, `backend`,
//! `writer`, `reviewer`, `qa`, `debugger`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::agents::{AgentRole, Persona};
use crate::llm::http::{DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT};
use crate::models::{LlmProvider, ModelConfig};
use crate::state::io::get_runtime_path;
use crate::types::ContentPolicy;

/// Partial persona replacement; unset fields keep the bundled default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaOverride {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Global LLM provider (default: OpenRouter)
    pub global_provider: LlmProvider,
    /// Global model to use for all agents
    pub global_model: Option<String>,
    /// Base URL override for the LLM API
    pub base_url: Option<String>,
    /// Per-agent model overrides (role id -> model name)
    pub per_agent_models: HashMap<String, String>,
    /// Per-agent provider overrides (role id -> provider)
    pub per_agent_providers: HashMap<String, LlmProvider>,
    /// Per-agent base URL overrides (role id -> base_url)
    pub per_agent_base_urls: HashMap<String, String>,
    /// Persona overrides (role id -> name / system prompt)
    pub personas: HashMap<String, PersonaOverride>,
    /// Per-call ceiling on completion requests
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// In-flight completion calls across all agents
    pub max_concurrent_calls: usize,
    /// Re-run a stage once with a reinforced persona on unusable output
    pub retry_malformed: bool,
    /// Send high-severity review issues to the fixer
    pub remediation: bool,
    pub content_policy: ContentPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::default(),
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
            per_agent_base_urls: HashMap::new(),
            personas: HashMap::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_concurrent_calls: 4,
            retry_malformed: true,
            remediation: false,
            content_policy: ContentPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// `.sitesmith/config.json`
    pub fn default_path() -> PathBuf {
        get_runtime_path().join("config.json")
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("Invalid pipeline config: {:?}", path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config: {:?}", path)),
        }
    }

    /// Get model config for a specific agent
    pub fn model_config_for(&self, role: AgentRole) -> ModelConfig {
        let id = role.id();

        // Provider: per-agent override -> global
        let provider = self
            .per_agent_providers
            .get(id)
            .copied()
            .unwrap_or(self.global_provider);

        // Model: per-agent override -> global -> default for provider
        let model = self
            .per_agent_models
            .get(id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        // Base URL: per-agent override -> global -> provider default
        let base_url = self
            .per_agent_base_urls
            .get(id)
            .or(self.base_url.as_ref())
            .cloned();

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    /// Bundled persona with any configured override applied
    pub fn persona_for(&self, role: AgentRole) -> Persona {
        let mut persona = Persona::default_for(role);
        if let Some(over) = self.personas.get(role.id()) {
            if let Some(name) = &over.name {
                persona.name = name.clone();
            }
            if let Some(prompt) = &over.system_prompt {
                persona.system_prompt = prompt.clone();
            }
        }
        persona
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_resolution_order() {
        let mut config = PipelineConfig {
            global_provider: LlmProvider::Anthropic,
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.model_config_for(AgentRole::Planner).model,
            "claude-sonnet-4-20250514"
        );

        config.global_model = Some("claude-3-5-haiku-20241022".to_string());
        config
            .per_agent_providers
            .insert("frontend".to_string(), LlmProvider::OpenAI);
        config
            .per_agent_models
            .insert("frontend".to_string(), "gpt-4o".to_string());
        config
            .per_agent_base_urls
            .insert("frontend".to_string(), "http://localhost:8000/v1".to_string());

        let planner = config.model_config_for(AgentRole::Planner);
        assert_eq!(planner.model, "claude-3-5-haiku-20241022");
        assert_eq!(planner.base_url, None);

        let frontend = config.model_config_for(AgentRole::Frontend);
        assert_eq!(frontend.provider, LlmProvider::OpenAI);
        assert_eq!(frontend.model, "gpt-4o");
        assert_eq!(frontend.endpoint_base(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"global_provider": "deepseek", "content_policy": "reject_empty", "remediation": true}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.global_provider, LlmProvider::DeepSeek);
        assert_eq!(config.content_policy, ContentPolicy::RejectEmpty);
        assert!(config.remediation);
        assert!(config.retry_malformed);
        assert_eq!(config.max_concurrent_calls, 4);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"content_policy": "sometimes"}"#).unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn test_persona_override() {
        let mut config = PipelineConfig::default();
        config.personas.insert(
            "pm".to_string(),
            PersonaOverride {
                name: None,
                system_prompt: Some("You plan restaurant websites only.".to_string()),
            },
        );
        let persona = config.persona_for(AgentRole::Planner);
        assert_eq!(persona.name, "Project Manager");
        assert_eq!(persona.system_prompt, "You plan restaurant websites only.");
        assert_eq!(
            config.persona_for(AgentRole::Designer),
            Persona::default_for(AgentRole::Designer)
        );
    }
}
