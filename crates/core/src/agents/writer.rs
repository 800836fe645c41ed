//! Content writer: website copy from brief and design.

use super::{role_agent, AgentRole};
use crate::error::PipelineError;
use crate::types::{ContentBundle, ProjectBrief, UiDesign};

role_agent!(ContentWriter, AgentRole::Writer);

impl ContentWriter {
    pub async fn write_content(
        &self,
        brief: &ProjectBrief,
        design: &UiDesign,
    ) -> Result<ContentBundle, PipelineError> {
        let context = format!(
            "Project: {}\nTarget Audience: {}\nKey Features: {}\nLayout: {}",
            brief.summary,
            brief.target_users,
            brief.key_features.join(", "),
            design.layout
        );
        let content: ContentBundle = self.0.ask_structured("Write website copy.", &context).await?;
        self.0.check(&content)?;
        Ok(content)
    }
}
