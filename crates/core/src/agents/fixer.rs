//! Debugger: replacement files for a list of reported issues.
//!
//! Not part of the default pipeline; the orchestrator calls it only when
//! remediation is switched on.

use super::{role_agent, AgentRole, FixedFileSet};
use crate::error::PipelineError;
use crate::types::{CodeFile, ReviewIssue};

role_agent!(Debugger, AgentRole::Fixer);

impl Debugger {
    /// Files are sent whole; the answer holds only the files that changed.
    pub async fn fix_bugs(
        &self,
        files: &[CodeFile],
        issues: &[ReviewIssue],
    ) -> Result<Vec<CodeFile>, PipelineError> {
        let issue_text = serde_json::to_string_pretty(issues)
            .map_err(|e| PipelineError::Validation(format!("Unserializable issue list: {}", e)))?;
        let file_text = files
            .iter()
            .map(|f| format!("File: {}\n{}", f.path, f.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let context = format!("Issues:\n{}\n\nFiles:\n{}", issue_text, file_text);

        let answer: FixedFileSet = self
            .0
            .ask_structured("Fix these issues in the code.", &context)
            .await?;
        self.0.check(answer.fixed_files.as_slice())?;
        Ok(answer.fixed_files)
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
    async fn test_fix_bugs_sends_issues_and_full_files() {
        let backend = Arc::new(ScriptedBackend::new().fallback(Reply::json(serde_json::json!({
            "fixed_files": [{
                "path": "src/app/page.tsx",
                "content": "export default function Page() { return null; }",
                "language": "typescript"
            }]
        }))));
        let debugger = Debugger::from_agent(agent(
            AgentRole::Fixer,
            backend.clone(),
            ContentPolicy::Accept,
        ));
        let long_body = "x".repeat(2_000);
        let issues = vec![ReviewIssue {
            severity: Severity::High,
            file: "src/app/page.tsx".to_string(),
            issue: "Component never returns".to_string(),
            suggestion: "Return null".to_string(),
        }];

        let fixed = debugger
            .fix_bugs(&[ts_file("src/app/page.tsx", &long_body)], &issues)
            .await
            .unwrap();
        assert_eq!(fixed.len(), 1);

        let prompt = &backend.calls()[0].user_prompt;
        assert!(prompt.contains("Component never returns"));
        assert!(prompt.contains(&long_body));
    }
}
