//! # Project State Store
//!
//! Owns one [`ProjectState`] per run. Every mutator sets one field, moves
//! `step` forward and mirrors the whole document to the sink. A failed
//! write is logged and counted, never returned: the in-memory state stays
//! authoritative for the rest of the run.
//!
//! | Mutator | Field | Step afterwards |
//! |---------|-------|-----------------|
//! | `save_brief` | `projectBrief` | design |
//! | `save_design` | `uiDesign` | implementation |
//! | `save_frontend_code` | `code.frontend` | review, once both collections exist |
//! | `save_backend_code` | `code.backend` | review, once both collections exist |
//! | `save_content` | `content` | unchanged |
//! | `save_qa_report` | `qaReport` | testing |
//! | `mark_complete` | - | complete |

use std::sync::Arc;

use super::project_state::{ProjectState, Step};
use super::sinks::{MemorySink, StateSink};
use crate::error::StateError;
use crate::types::{CodeFile, ContentBundle, ProjectBrief, QaReport, UiDesign};

pub struct ProjectStore {
    state: ProjectState,
    sink: Arc<dyn StateSink>,
    persistence_failures: usize,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), StateError> {
    if slot.is_some() {
        return Err(StateError::AlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

impl ProjectStore {
    pub fn new(sink: Arc<dyn StateSink>) -> Self {
        Self {
            state: ProjectState::default(),
            sink,
            persistence_failures: 0,
        }
    }

    /// Store mirrored only to memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySink::new()))
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    /// Writes that failed and were swallowed
    pub fn persistence_failures(&self) -> usize {
        self.persistence_failures
    }

    pub async fn save_brief(&mut self, brief: ProjectBrief) -> Result<(), StateError> {
        set_once(&mut self.state.project_brief, brief, "projectBrief")?;
        self.state.advance_to(Step::Design);
        self.persist().await;
        Ok(())
    }

    pub async fn save_design(&mut self, design: UiDesign) -> Result<(), StateError> {
        set_once(&mut self.state.ui_design, design, "uiDesign")?;
        self.state.advance_to(Step::Implementation);
        self.persist().await;
        Ok(())
    }

    pub async fn save_frontend_code(&mut self, files: Vec<CodeFile>) -> Result<(), StateError> {
        set_once(&mut self.state.code.frontend, files, "code.frontend")?;
        self.advance_if_code_complete();
        self.persist().await;
        Ok(())
    }

    pub async fn save_backend_code(&mut self, files: Vec<CodeFile>) -> Result<(), StateError> {
        set_once(&mut self.state.code.backend, files, "code.backend")?;
        self.advance_if_code_complete();
        self.persist().await;
        Ok(())
    }

    pub async fn save_content(&mut self, content: ContentBundle) -> Result<(), StateError> {
        set_once(&mut self.state.content, content, "content")?;
        self.persist().await;
        Ok(())
    }

    pub async fn save_qa_report(&mut self, report: QaReport) -> Result<(), StateError> {
        set_once(&mut self.state.qa_report, report, "qaReport")?;
        self.state.advance_to(Step::Testing);
        self.persist().await;
        Ok(())
    }

    pub async fn mark_complete(&mut self) {
        self.state.advance_to(Step::Complete);
        self.persist().await;
    }

    fn advance_if_code_complete(&mut self) {
        if self.state.has_code() {
            self.state.advance_to(Step::Review);
        }
    }

    async fn persist(&mut self) {
        if let Err(e) = self.sink.persist(&self.state).await {
            self.persistence_failures += 1;
            tracing::error!(step = %self.state.step, "Error saving state: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct BrokenSink;

    #[async_trait]
    impl StateSink for BrokenSink {
        async fn persist(&self, _state: &ProjectState) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        async fn load(&self) -> anyhow::Result<Option<ProjectState>> {
            Ok(None)
        }
    }

    fn brief() -> ProjectBrief {
        ProjectBrief {
            summary: "s".to_string(),
            target_users: "u".to_string(),
            key_features: vec!["f".to_string()],
            tech_stack: "t".to_string(),
        }
    }

    fn design() -> UiDesign {
        UiDesign {
            layout: "l".to_string(),
            colors: vec!["#000".to_string()],
            typography: "t".to_string(),
            components: vec!["Hero".to_string()],
        }
    }

    #[tokio::test]
    async fn test_every_save_is_mirrored() {
        let sink = Arc::new(MemorySink::new());
        let mut store = ProjectStore::new(sink.clone());

        store.save_brief(brief()).await.unwrap();
        assert_eq!(sink.last().unwrap().step, Step::Design);

        store.save_design(design()).await.unwrap();
        assert_eq!(sink.last().unwrap().step, Step::Implementation);
        assert_eq!(sink.writes(), 2);
        assert_eq!(sink.last().as_ref(), Some(store.state()));
    }

    #[tokio::test]
    async fn test_code_saves_reach_review_only_together() {
        let mut store = ProjectStore::in_memory();
        store.save_brief(brief()).await.unwrap();
        store.save_design(design()).await.unwrap();

        store.save_frontend_code(vec![]).await.unwrap();
        assert_eq!(store.state().step, Step::Implementation);

        store.save_backend_code(vec![]).await.unwrap();
        assert_eq!(store.state().step, Step::Review);

        store.save_content(ContentBundle::default()).await.unwrap();
        assert_eq!(store.state().step, Step::Review);

        store.mark_complete().await;
        assert_eq!(store.state().step, Step::Complete);
    }

    #[tokio::test]
    async fn test_fields_are_set_once() {
        let mut store = ProjectStore::in_memory();
        store.save_brief(brief()).await.unwrap();
        let err = store.save_brief(brief()).await.unwrap_err();
        assert_eq!(err, StateError::AlreadySet("projectBrief"));
        assert_eq!(store.state().step, Step::Design);
    }

    #[tokio::test]
    async fn test_persistence_failures_are_swallowed() {
        let mut store = ProjectStore::new(Arc::new(BrokenSink));
        store.save_brief(brief()).await.unwrap();
        store.save_design(design()).await.unwrap();

        assert_eq!(store.persistence_failures(), 2);
        assert!(store.state().ui_design.is_some());
    }

    #[tokio::test]
    async fn test_step_is_monotonic_for_any_save_order() {
        let mut store = ProjectStore::in_memory();
        let mut seen = vec![store.state().step];

        store.save_design(design()).await.unwrap();
        seen.push(store.state().step);
        store.save_brief(brief()).await.unwrap();
        seen.push(store.state().step);
        store.save_backend_code(vec![]).await.unwrap();
        seen.push(store.state().step);
        store.save_frontend_code(vec![]).await.unwrap();
        seen.push(store.state().step);

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        assert_eq!(store.state().step, Step::Review);
    }
}
