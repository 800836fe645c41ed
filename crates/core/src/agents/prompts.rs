//! Default persona prompts bundled at compile time.
//!
//! Overrides from [`crate::config::PipelineConfig::personas`] replace these
//! per role at startup.

use super::AgentRole;

/// Project Manager - turns the raw request into a brief
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// UI/UX Designer - design system from the brief
pub const DESIGNER: &str = include_str!("defaults/designer.md");

/// Frontend Developer - pages and components
pub const FRONTEND: &str = include_str!("defaults/frontend.md");

/// Backend Developer - API routes with mock data
pub const BACKEND: &str = include_str!("defaults/backend.md");

/// Content Writer - website copy
pub const WRITER: &str = include_str!("defaults/writer.md");

/// Code Reviewer - scored review of both code collections
pub const REVIEWER: &str = include_str!("defaults/reviewer.md");

/// QA Tester - simulated test report
pub const QA: &str = include_str!("defaults/qa.md");

/// Debugger - replacement files for reported issues
pub const FIXER: &str = include_str!("defaults/fixer.md");

pub fn default_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Planner => PLANNER,
        AgentRole::Designer => DESIGNER,
        AgentRole::Frontend => FRONTEND,
        AgentRole::Backend => BACKEND,
        AgentRole::Writer => WRITER,
        AgentRole::Reviewer => REVIEWER,
        AgentRole::Qa => QA,
        AgentRole::Fixer => FIXER,
    }
}
