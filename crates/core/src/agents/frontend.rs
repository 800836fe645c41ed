//! Frontend developer: pages and components from brief and design.

use super::{role_agent, AgentRole, FileSet};
use crate::error::PipelineError;
use crate::types::{CodeFile, ProjectBrief, UiDesign};

role_agent!(FrontendDeveloper, AgentRole::Frontend);

impl FrontendDeveloper {
    pub async fn generate_code(
        &self,
        brief: &ProjectBrief,
        design: &UiDesign,
    ) -> Result<Vec<CodeFile>, PipelineError> {
        let context = format!(
            "Project: {}\nFeatures: {}\nDesign: {}\nColors: {}\nTypography: {}\nComponents: {}",
            brief.summary,
            brief.key_features.join(", "),
            design.layout,
            design.colors.join(", "),
            design.typography,
            design.components.join(", ")
        );
        let answer: FileSet = self
            .0
            .ask_structured("Generate frontend code.", &context)
            .await?;
        self.0.check(answer.files.as_slice())?;
        Ok(answer.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::agent;
    use crate::agents::Role;
    use crate::llm::mock::{Reply, ScriptedBackend};
    use crate::types::ContentPolicy;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_duplicate_paths_are_rejected() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "files": [
                { "path": "src/app/page.tsx", "content": "a", "language": "typescript" },
                { "path": "src/app/page.tsx", "content": "b", "language": "typescript" }
            ]
        }))));
        let frontend = FrontendDeveloper::from_agent(agent(
            AgentRole::Frontend,
            backend,
            ContentPolicy::Accept,
        ));
        let brief = ProjectBrief {
            summary: "s".to_string(),
            target_users: "u".to_string(),
            key_features: vec![],
            tech_stack: "t".to_string(),
        };
        let design = UiDesign {
            layout: "l".to_string(),
            colors: vec![],
            typography: "t".to_string(),
            components: vec![],
        };

        let err = frontend.generate_code(&brief, &design).await.unwrap_err();
        assert!(err.is_unusable_output());
    }
}
