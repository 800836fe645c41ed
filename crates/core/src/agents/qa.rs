//! QA tester: simulated test report over both code collections.

use super::{render_code_excerpts, role_agent, AgentRole};
use crate::error::PipelineError;
use crate::types::{CodeFile, QaReport};

role_agent!(QaTester, AgentRole::Qa);

impl QaTester {
    pub async fn test(
        &self,
        frontend: &[CodeFile],
        backend: &[CodeFile],
    ) -> Result<QaReport, PipelineError> {
        let context = render_code_excerpts(frontend, backend);
        let report: QaReport = self
            .0
            .ask_structured("Simulate testing scenarios and report bugs.", &context)
            .await?;
        self.0.check(&report)?;
        Ok(report)
    }
}
