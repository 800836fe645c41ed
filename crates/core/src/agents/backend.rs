//! Backend developer: mock-data API routes from the brief alone.

use super::{role_agent, AgentRole, FileSet};
use crate::error::PipelineError;
use crate::types::{CodeFile, ProjectBrief};

role_agent!(BackendDeveloper, AgentRole::Backend);

impl BackendDeveloper {
    pub async fn generate_apis(&self, brief: &ProjectBrief) -> Result<Vec<CodeFile>, PipelineError> {
        let context = format!(
            "Project: {}\nFeatures: {}\nTech Stack: {}",
            brief.summary,
            brief.key_features.join(", "),
            brief.tech_stack
        );
        let answer: FileSet = self
            .0
            .ask_structured("Generate API routes with mock data.", &context)
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
    use crate::types::{ContentPolicy, Language};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generate_apis_unwraps_files() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "files": [{
                "path": "src/app/api/photos/route.ts",
                "content": "export async function GET() {}",
                "language": "ts"
            }]
        }))));
        let developer = BackendDeveloper::from_agent(agent(
            AgentRole::Backend,
            backend.clone(),
            ContentPolicy::Accept,
        ));
        let brief = ProjectBrief {
            summary: "Photo portfolio".to_string(),
            target_users: "Clients".to_string(),
            key_features: vec!["Gallery".to_string()],
            tech_stack: "Next.js".to_string(),
        };

        let files = developer.generate_apis(&brief).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, Language::Typescript);
        assert!(backend.calls()[0].user_prompt.contains("Tech Stack: Next.js"));
    }
}
