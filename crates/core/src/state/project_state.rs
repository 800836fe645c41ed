//! The aggregate record of one pipeline run.
//!
//! Serialized camelCase; this is the persisted document layout:
//!
//! ```json
//! {
//!   "step": "implementation",
//!   "projectBrief": { ... },
//!   "uiDesign": { ... },
//!   "code": { "frontend": null, "backend": null },
//!   "content": null,
//!   "qaReport": null
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{CodeFile, ContentBundle, ProjectBrief, QaReport, UiDesign};

/// Phase marker; only ever moves forward
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Discovery,
    Design,
    Implementation,
    Review,
    Testing,
    Complete,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Discovery => "discovery",
            Step::Design => "design",
            Step::Implementation => "implementation",
            Step::Review => "review",
            Step::Testing => "testing",
            Step::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeState {
    pub frontend: Option<Vec<CodeFile>>,
    pub backend: Option<Vec<CodeFile>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub step: Step,
    pub project_brief: Option<ProjectBrief>,
    pub ui_design: Option<UiDesign>,
    pub code: CodeState,
    pub content: Option<ContentBundle>,
    pub qa_report: Option<QaReport>,
}

impl ProjectState {
    /// Move `step` forward to `step`; never backwards
    pub(crate) fn advance_to(&mut self, step: Step) {
        self.step = self.step.max(step);
    }

    pub fn has_code(&self) -> bool {
        self.code.frontend.is_some() && self.code.backend.is_some()
    }
}
