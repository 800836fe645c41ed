//! Code reviewer: scored review over excerpts of both code collections.

use super::{render_code_excerpts, role_agent, AgentRole};
use crate::error::PipelineError;
use crate::types::{CodeFile, ReviewReport};

role_agent!(CodeReviewer, AgentRole::Reviewer);

impl CodeReviewer {
    pub async fn review_code(
        &self,
        frontend: &[CodeFile],
        backend: &[CodeFile],
    ) -> Result<ReviewReport, PipelineError> {
        let context = render_code_excerpts(frontend, backend);
        let report: ReviewReport = self.0.ask_structured("Review this code.", &context).await?;
        self.0.check(&report)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{agent, ts_file};
    use crate::agents::Role;
    use crate::llm::mock::{Reply, ScriptedBackend};
    use crate::types::{ContentPolicy, Severity};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_review_sees_both_collections() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "score": 72,
            "issues": [{
                "severity": "High",
                "file": "src/app/api/contact/route.ts",
                "issue": "No input validation",
                "suggestion": "Validate the body"
            }],
            "summary": "Solid start"
        }))));
        let reviewer = CodeReviewer::from_agent(agent(
            AgentRole::Reviewer,
            backend.clone(),
            ContentPolicy::Accept,
        ));

        let report = reviewer
            .review_code(
                &[ts_file("src/app/page.tsx", "page")],
                &[ts_file("src/app/api/contact/route.ts", "route")],
            )
            .await
            .unwrap();
        assert_eq!(report.high_severity_issues().len(), 1);
        assert_eq!(report.issues[0].severity, Severity::High);

        let prompt = &backend.calls()[0].user_prompt;
        assert!(prompt.contains("File: src/app/page.tsx"));
        assert!(prompt.contains("File: src/app/api/contact/route.ts"));
    }
}
