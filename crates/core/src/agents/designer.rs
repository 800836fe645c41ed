//! Designer: project brief to design system.

use super::{role_agent, AgentRole};
use crate::error::PipelineError;
use crate::types::{ProjectBrief, UiDesign};

role_agent!(Designer, AgentRole::Designer);

impl Designer {
    pub async fn create_design(&self, brief: &ProjectBrief) -> Result<UiDesign, PipelineError> {
        let context = format!(
            "Summary: {}\nTarget Users: {}\nKey Features: {}",
            brief.summary,
            brief.target_users,
            brief.key_features.join(", ")
        );
        let design: UiDesign = self
            .0
            .ask_structured("Create a UI Design System.", &context)
            .await?;
        self.0.check(&design)?;
        Ok(design)
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

    fn brief() -> ProjectBrief {
        ProjectBrief {
            summary: "Portfolio for a photographer".to_string(),
            target_users: "Clients".to_string(),
            key_features: vec!["Gallery".to_string(), "Contact form".to_string()],
            tech_stack: "Next.js".to_string(),
        }
    }

    #[tokio::test]
    async fn test_design_context_lists_features() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "layout": "Full-bleed gallery grid",
            "colors": ["#111111", "#f5f5f5"],
            "typography": "Playfair Display / Inter",
            "components": ["Header", "Gallery"]
        }))));
        let designer = Designer::from_agent(agent(
            AgentRole::Designer,
            backend.clone(),
            ContentPolicy::RejectEmpty,
        ));

        let design = designer.create_design(&brief()).await.unwrap();
        assert_eq!(design.colors.len(), 2);
        assert!(backend.calls()[0]
            .user_prompt
            .contains("Key Features: Gallery, Contact form"));
    }

    #[tokio::test]
    async fn test_named_colors_rejected_under_strict_policy() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "layout": "Single column",
            "colors": ["charcoal"],
            "typography": "Inter",
            "components": ["Hero"]
        }))));
        let designer = Designer::from_agent(agent(
            AgentRole::Designer,
            backend,
            ContentPolicy::RejectEmpty,
        ));

        let err = designer.create_design(&brief()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
