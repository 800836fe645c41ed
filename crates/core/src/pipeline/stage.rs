//! # Pipeline Stages
//!
//! The fixed stage order of one run. There is no branching and no loop
//! back: a run either walks every stage to `Complete` or stops in `Failed`.

use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Planner turns the request into a brief
    Planning,
    /// Designer derives the design system
    Designing,
    /// Frontend, backend and content generated concurrently
    Building,
    /// Code review (runs alongside testing)
    Reviewing,
    /// Simulated QA
    Testing,
    Complete,
    Failed,
}

impl PipelineStage {
    /// Progress percentage reported while this stage runs
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Planning => 10,
            PipelineStage::Designing => 25,
            PipelineStage::Building => 50,
            PipelineStage::Reviewing => 75,
            PipelineStage::Testing => 90,
            PipelineStage::Complete => 100,
            PipelineStage::Failed => 0,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Planning => "planning",
            PipelineStage::Designing => "designing",
            PipelineStage::Building => "building",
            PipelineStage::Reviewing => "reviewing",
            PipelineStage::Testing => "testing",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Planning,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Planning => PipelineStage::Designing,
            PipelineStage::Designing => PipelineStage::Building,
            PipelineStage::Building => PipelineStage::Reviewing,
            PipelineStage::Reviewing => PipelineStage::Testing,
            PipelineStage::Testing => PipelineStage::Complete,
            PipelineStage::Complete => PipelineStage::Complete,
            PipelineStage::Failed => PipelineStage::Failed,
        };
    }

    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut pipeline = Pipeline::new();
        assert_eq!(pipeline.stage, PipelineStage::Planning);

        for _ in 0..5 {
            pipeline.advance();
        }
        assert_eq!(pipeline.stage, PipelineStage::Complete);

        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::Complete);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut pipeline = Pipeline::new();
        pipeline.advance();
        pipeline.fail();
        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::Failed);
    }

    #[test]
    fn test_progress_is_monotonic_along_the_happy_path() {
        let mut pipeline = Pipeline::new();
        let mut last = 0;
        while pipeline.stage != PipelineStage::Complete {
            assert!(pipeline.stage.progress() > last);
            last = pipeline.stage.progress();
            pipeline.advance();
        }
        assert_eq!(pipeline.stage.progress(), 100);
    }
}
