//! Planner: raw request to project brief.

use super::{role_agent, AgentRole};
use crate::error::PipelineError;
use crate::types::ProjectBrief;

role_agent!(Planner, AgentRole::Planner);

impl Planner {
    pub async fn analyze(&self, request: &str) -> Result<ProjectBrief, PipelineError> {
        let task = format!("Create a project brief for: \"{}\"", request.trim());
        let brief: ProjectBrief = self.0.ask_structured(&task, "").await?;
        self.0.check(&brief)?;
        Ok(brief)
    }
}
