//! # Agent Roster
//!
//! Eight role agents, each a persona (fixed system prompt) plus the typed
//! operations that role offers. Agents never call each other and never see
//! project state; the orchestrator threads every value between them.
//!
//! | Role | Operation | Output |
//! |------|-----------|--------|
//! | [`Planner`] | `analyze` | [`ProjectBrief`](crate::types::ProjectBrief) |
//! | [`Designer`] | `create_design` | [`UiDesign`](crate::types::UiDesign) |
//! | [`FrontendDeveloper`] | `generate_code` | `Vec<CodeFile>` |
//! | [`BackendDeveloper`] | `generate_apis` | `Vec<CodeFile>` |
//! | [`ContentWriter`] | `write_content` | [`ContentBundle`](crate::types::ContentBundle) |
//! | [`CodeReviewer`] | `review_code` | [`ReviewReport`](crate::types::ReviewReport) |
//! | [`QaTester`] | `test` | [`QaReport`](crate::types::QaReport) |
//! | [`Debugger`] | `fix_bugs` | `Vec<CodeFile>` |

pub mod backend;
pub mod designer;
pub mod fixer;
pub mod frontend;
pub mod planner;
pub mod prompts;
pub mod qa;
pub mod reviewer;
pub mod writer;

pub use backend::BackendDeveloper;
pub use designer::Designer;
pub use fixer::Debugger;
pub use frontend::FrontendDeveloper;
pub use planner::Planner;
pub use qa::QaTester;
pub use reviewer::CodeReviewer;
pub use writer::ContentWriter;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::llm::client::{CREATIVE_TEMPERATURE, STRUCTURED_TEMPERATURE};
use crate::llm::{CompletionBackend, HttpBackend, StructuredClient};
use crate::types::{CodeFile, ContentPolicy, Validate};

/// Longest slice of a file shown to the reviewer and the QA tester
pub const EXCERPT_CHARS: usize = 500;

const REINFORCED_INSTRUCTION: &str = "Your previous answer could not be used. \
Respond with a single JSON value and nothing else: no prose, no markdown fences, \
no comments. Every required field must be present.";

// ============================================================================
// Roles & Personas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "pm")]
    Planner,
    #[serde(rename = "ui")]
    Designer,
    #[serde(rename = "frontend")]
    Frontend,
    #[serde(rename = "backend")]
    Backend,
    #[serde(rename = "writer")]
    Writer,
    #[serde(rename = "reviewer")]
    Reviewer,
    #[serde(rename = "qa")]
    Qa,
    #[serde(rename = "debugger")]
    Fixer,
}

impl AgentRole {
    pub fn all() -> Vec<AgentRole> {
        vec![
            AgentRole::Planner,
            AgentRole::Designer,
            AgentRole::Frontend,
            AgentRole::Backend,
            AgentRole::Writer,
            AgentRole::Reviewer,
            AgentRole::Qa,
            AgentRole::Fixer,
        ]
    }

    /// Stable identifier used in events and config keys
    pub fn id(&self) -> &'static str {
        match self {
            AgentRole::Planner => "pm",
            AgentRole::Designer => "ui",
            AgentRole::Frontend => "frontend",
            AgentRole::Backend => "backend",
            AgentRole::Writer => "writer",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Qa => "qa",
            AgentRole::Fixer => "debugger",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Planner => "Project Manager",
            AgentRole::Designer => "UI/UX Designer",
            AgentRole::Frontend => "Frontend Developer",
            AgentRole::Backend => "Backend Developer",
            AgentRole::Writer => "Content Writer",
            AgentRole::Reviewer => "Code Reviewer",
            AgentRole::Qa => "QA Tester",
            AgentRole::Fixer => "Debugger",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentRole::all()
            .into_iter()
            .find(|role| role.id() == s)
            .ok_or_else(|| format!("Unknown agent role: '{}'", s))
    }
}

/// The fixed identity of an agent: who it is and what it is told on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub role: AgentRole,
    pub name: String,
    pub system_prompt: String,
}

impl Persona {
    /// The bundled persona for a role
    pub fn default_for(role: AgentRole) -> Self {
        Self {
            role,
            name: role.display_name().to_string(),
            system_prompt: prompts::default_prompt(role).to_string(),
        }
    }

    /// Same persona with the "JSON only, nothing else" instruction appended
    pub fn reinforced(&self) -> Self {
        Self {
            system_prompt: format!("{}\n\n{}", self.system_prompt.trim_end(), REINFORCED_INSTRUCTION),
            ..self.clone()
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

/// A persona bound to a completion client
#[derive(Clone)]
pub struct Agent {
    persona: Persona,
    client: Arc<StructuredClient>,
    policy: ContentPolicy,
}

impl Agent {
    pub fn new(persona: Persona, client: Arc<StructuredClient>, policy: ContentPolicy) -> Self {
        Self {
            persona,
            client,
            policy,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.persona.role
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Free-text answer at creative temperature
    pub async fn ask(&self, task: &str, context: &str) -> Result<String, PipelineError> {
        tracing::debug!(agent = %self.persona.name, "Working...");
        self.client
            .complete(
                &self.persona.system_prompt,
                &compose_prompt(task, context),
                CREATIVE_TEMPERATURE,
            )
            .await
    }

    /// Structured answer parsed into `T`
    pub async fn ask_structured<T>(&self, task: &str, context: &str) -> Result<T, PipelineError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        tracing::debug!(agent = %self.persona.name, "Working on JSON...");
        self.client
            .complete_structured(
                &self.persona.system_prompt,
                &compose_prompt(task, context),
                STRUCTURED_TEMPERATURE,
            )
            .await
    }

    /// Apply the configured content policy to a parsed answer
    pub fn check<V: Validate + ?Sized>(&self, value: &V) -> Result<(), PipelineError> {
        value.validate(self.policy).map_err(|reason| {
            PipelineError::Validation(format!("{} answer rejected: {}", self.persona.name, reason))
        })
    }

    pub fn reinforced(&self) -> Self {
        Self {
            persona: self.persona.reinforced(),
            ..self.clone()
        }
    }
}

/// `Context:\n{context}\n\nTask: {task}`, or just the task without context
pub fn compose_prompt(task: &str, context: &str) -> String {
    if context.trim().is_empty() {
        task.to_string()
    } else {
        format!("Context:\n{}\n\nTask: {}", context, task)
    }
}

/// Capability shared by every role type: one persona-bound [`Agent`].
pub trait Role: Sized {
    const ROLE: AgentRole;

    fn from_agent(agent: Agent) -> Self;

    fn agent(&self) -> &Agent;

    /// A copy of this role whose persona insists on bare JSON
    fn reinforced(&self) -> Self {
        Self::from_agent(self.agent().reinforced())
    }
}

macro_rules! role_agent {
    ($name:ident, $role:expr) => {
        #[derive(Clone)]
        pub struct $name(pub(crate) $crate::agents::Agent);

        impl $crate::agents::Role for $name {
            const ROLE: $crate::agents::AgentRole = $role;

            fn from_agent(agent: $crate::agents::Agent) -> Self {
                Self(agent)
            }

            fn agent(&self) -> &$crate::agents::Agent {
                &self.0
            }
        }
    };
}
pub(crate) use role_agent;

// ============================================================================
// Shared output envelopes & rendering
// ============================================================================

/// `{"files": [...]}` answer of the implementers
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct FileSet {
    pub files: Vec<CodeFile>,
}

/// `{"fixed_files": [...]}` answer of the fixer
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct FixedFileSet {
    pub fixed_files: Vec<CodeFile>,
}

/// First [`EXCERPT_CHARS`] characters of `content`, marked when cut
pub fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Excerpts of both code collections, as shown to reviewer and QA
pub fn render_code_excerpts(frontend: &[CodeFile], backend: &[CodeFile]) -> String {
    let section = |title: &str, files: &[CodeFile]| -> String {
        let body = if files.is_empty() {
            "(no files)".to_string()
        } else {
            files
                .iter()
                .map(|f| {
                    format!(
                        "File: {} ({})\nCode:\n{}",
                        f.path,
                        language_name(f),
                        excerpt(&f.content)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        format!("## {}\n{}", title, body)
    };
    format!(
        "{}\n\n{}",
        section("Frontend files", frontend),
        section("Backend files", backend)
    )
}

fn language_name(file: &CodeFile) -> String {
    serde_json::to_value(file.language)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

// ============================================================================
// Roster
// ============================================================================

/// All eight agents of one pipeline
#[derive(Clone)]
pub struct Roster {
    pub planner: Planner,
    pub designer: Designer,
    pub frontend: FrontendDeveloper,
    pub backend: BackendDeveloper,
    pub writer: ContentWriter,
    pub reviewer: CodeReviewer,
    pub qa: QaTester,
    pub fixer: Debugger,
}

impl Roster {
    /// HTTP-backed agents, one client per role, all sharing one call limiter
    pub fn from_config(config: &PipelineConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_calls.max(1)));
        Self::build(config, |role| {
            let model_config = config.model_config_for(role);
            let model = model_config.model.clone();
            let backend = HttpBackend::new(model_config)
                .with_timeout(Duration::from_secs(config.timeout_secs))
                .with_max_tokens(config.max_tokens)
                .with_limiter(limiter.clone());
            Arc::new(StructuredClient::new(Arc::new(backend), model))
        })
    }

    /// Every agent talks to the same backend (tests, offline runs)
    pub fn with_backend(config: &PipelineConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::build(config, |role| {
            Arc::new(StructuredClient::new(
                backend.clone(),
                config.model_config_for(role).model,
            ))
        })
    }

    fn build(
        config: &PipelineConfig,
        mut client_for: impl FnMut(AgentRole) -> Arc<StructuredClient>,
    ) -> Self {
        let mut agent = |role: AgentRole| {
            Agent::new(config.persona_for(role), client_for(role), config.content_policy)
        };
        Self {
            planner: Planner::from_agent(agent(AgentRole::Planner)),
            designer: Designer::from_agent(agent(AgentRole::Designer)),
            frontend: FrontendDeveloper::from_agent(agent(AgentRole::Frontend)),
            backend: BackendDeveloper::from_agent(agent(AgentRole::Backend)),
            writer: ContentWriter::from_agent(agent(AgentRole::Writer)),
            reviewer: CodeReviewer::from_agent(agent(AgentRole::Reviewer)),
            qa: QaTester::from_agent(agent(AgentRole::Qa)),
            fixer: Debugger::from_agent(agent(AgentRole::Fixer)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::llm::mock::{Reply, ScriptedBackend};
    use crate::types::ProjectBrief;

    #[test]
    fn test_role_ids_round_trip() {
        for role in AgentRole::all() {
            assert_eq!(role.id().parse::<AgentRole>(), Ok(role));
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.id()));
        }
        assert!("cto".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_compose_prompt() {
        assert_eq!(compose_prompt("Do it.", ""), "Do it.");
        assert_eq!(
            compose_prompt("Do it.", "Project: x"),
            "Context:\nProject: x\n\nTask: Do it."
        );
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        let short = "const a = 1;";
        assert_eq!(excerpt(short), short);

        let long = "é".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_render_code_excerpts_covers_both_collections() {
        let rendered = render_code_excerpts(
            &[ts_file("src/app/page.tsx", "export default function Page() {}")],
            &[],
        );
        assert!(rendered.contains("File: src/app/page.tsx (typescript)"));
        assert!(rendered.contains("## Backend files\n(no files)"));
    }

    #[test]
    fn test_reinforced_persona_keeps_identity() {
        let persona = Persona::default_for(AgentRole::Designer);
        let reinforced = persona.reinforced();
        assert_eq!(reinforced.name, persona.name);
        assert!(reinforced.system_prompt.starts_with(persona.system_prompt.trim_end()));
        assert!(reinforced.system_prompt.contains("single JSON value"));
    }

    #[tokio::test]
    async fn test_ask_structured_uses_persona_and_low_temperature() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::text(
            r#"{"summary":"s","target_users":"u","key_features":[],"tech_stack":"t"}"#,
        )));
        let agent = agent(AgentRole::Planner, backend.clone(), ContentPolicy::Accept);

        let brief: ProjectBrief = agent.ask_structured("Plan.", "Request: x").await.unwrap();
        assert_eq!(brief.summary, "s");

        let call = &backend.calls()[0];
        assert!(call.system_prompt.contains("Project Manager"));
        assert_eq!(call.user_prompt, "Context:\nRequest: x\n\nTask: Plan.");
        assert_eq!(call.temperature, STRUCTURED_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_ask_is_free_text() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::text("Fresh bread daily")));
        let agent = agent(AgentRole::Writer, backend.clone(), ContentPolicy::Accept);

        let text = agent.ask("Write a tagline.", "").await.unwrap();
        assert_eq!(text, "Fresh bread daily");
        assert_eq!(backend.calls()[0].temperature, CREATIVE_TEMPERATURE);
    }

    #[test]
    fn test_check_maps_to_validation_error() {
        let backend = Arc::new(ScriptedBackend::new());
        let agent = agent(AgentRole::Planner, backend, ContentPolicy::RejectEmpty);
        let brief = ProjectBrief {
            summary: "s".to_string(),
            target_users: "u".to_string(),
            key_features: vec![],
            tech_stack: "t".to_string(),
        };
        let err = agent.check(&brief).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ref m) if m.contains("key_features")));
    }

    #[test]
    fn test_roster_applies_persona_overrides() {
        let mut config = PipelineConfig::default();
        config.personas.insert(
            "qa".to_string(),
            crate::config::PersonaOverride {
                name: Some("Release Gatekeeper".to_string()),
                system_prompt: None,
            },
        );
        let roster = Roster::with_backend(&config, Arc::new(ScriptedBackend::new()));
        assert_eq!(roster.qa.agent().name(), "Release Gatekeeper");
        assert_eq!(roster.qa.agent().persona().system_prompt, prompts::QA);
        assert_eq!(roster.planner.agent().role(), AgentRole::Planner);
    }
}
