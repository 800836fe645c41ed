//! # Orchestrator
//!
//! Drives one request through the fixed stage order, threading every
//! agent output into the next agent's input and committing each phase to
//! the project store before the next phase starts.
//!
//! Concurrent phases use `tokio::join!`: every branch runs to completion,
//! every failure is logged, and the first failure in branch order is the
//! one returned. No store mutation happens until all branches succeed.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::events::ProgressEvent;
use super::stage::{Pipeline, PipelineStage};
use crate::agents::{AgentRole, Role, Roster};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, StateError};
use crate::state::{ProjectState, ProjectStore};
use crate::types::{CodeFile, ReviewIssue, ReviewReport};

pub const SUCCESS: &str = "SUCCESS";

/// Everything a successful run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalState {
    #[serde(flatten)]
    pub state: ProjectState,
    pub review: ReviewReport,
    /// Replacement files from the remediation pass, when it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixes: Option<Vec<CodeFile>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub status: String,
    pub message: String,
    pub final_state: FinalState,
}

/// Await one agent call; an unusable answer is retried once with the
/// role's reinforced persona when `$retry` is set.
macro_rules! attempt {
    ($retry:expr, $role:expr, |$agent:ident| $call:expr) => {{
        let role = &$role;
        let first = {
            let $agent = role;
            $call.await
        };
        match first {
            Err(e) if $retry && e.is_unusable_output() => {
                tracing::warn!(
                    agent = %role.agent().name(),
                    error = %e,
                    "Unusable answer, retrying with reinforced instruction"
                );
                let reinforced = role.reinforced();
                let $agent = &reinforced;
                $call.await
            }
            other => other,
        }
    }};
}

/// Wrap each branch failure with its stage, log all of them, keep the order
fn collect_failures<const N: usize>(
    branches: [(PipelineStage, AgentRole, Option<PipelineError>); N],
) -> Vec<PipelineError> {
    let failures: Vec<PipelineError> = branches
        .into_iter()
        .filter_map(|(stage, agent, error)| error.map(|e| e.in_stage(stage, agent)))
        .collect();
    for failure in &failures {
        tracing::warn!(error = %failure, "Concurrent branch failed");
    }
    failures
}

fn commit_failed(stage: PipelineStage, agent: AgentRole) -> impl Fn(StateError) -> PipelineError {
    move |e| PipelineError::from(e).in_stage(stage, agent)
}

/// Runs the agent pipeline
pub struct Orchestrator {
    config: PipelineConfig,
    roster: Roster,
    pipeline: Pipeline,
    events: Vec<ProgressEvent>,
    event_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl Orchestrator {
    /// HTTP-backed roster built from `config`
    pub fn new(config: PipelineConfig) -> Self {
        let roster = Roster::from_config(&config);
        Self::with_roster(config, roster)
    }

    pub fn with_roster(config: PipelineConfig, roster: Roster) -> Self {
        Self {
            config,
            roster,
            pipeline: Pipeline::new(),
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Set event channel for streaming progress
    pub fn with_event_channel(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.pipeline.stage
    }

    /// Events of the latest run, in emission order
    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    async fn emit(&mut self, event: ProgressEvent) {
        tracing::debug!(agent = %event.agent, status = ?event.status, "{}", event.message);
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run the whole pipeline for one request.
    ///
    /// Any stage failure aborts the run; the store keeps whatever phases
    /// were committed before it.
    #[tracing::instrument(skip(self, store, request), fields(request_preview = %request.chars().take(50).collect::<String>()))]
    pub async fn run_pipeline(
        &mut self,
        request: &str,
        store: &mut ProjectStore,
    ) -> Result<PipelineResult, PipelineError> {
        self.pipeline = Pipeline::new();
        self.events.clear();
        tracing::info!("Starting project");

        match self.execute(request, store).await {
            Ok(result) => {
                tracing::info!(
                    score = result.final_state.review.score,
                    "Pipeline complete"
                );
                Ok(result)
            }
            Err(e) => {
                let progress = self.pipeline.stage.progress();
                self.pipeline.fail();
                tracing::error!(error = %e, "Pipeline failed");
                if let PipelineError::Stage { agent, .. } = &e {
                    let agent = *agent;
                    self.emit(ProgressEvent::error(agent, e.to_string(), progress))
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        request: &str,
        store: &mut ProjectStore,
    ) -> Result<PipelineResult, PipelineError> {
        let retry = self.config.retry_malformed;

        // 1. Planning
        let stage = PipelineStage::Planning;
        tracing::info!(%stage, "Phase started");
        self.emit(ProgressEvent::working(
            AgentRole::Planner,
            "Analyzing the request",
            stage.progress(),
        ))
        .await;
        let brief = attempt!(retry, self.roster.planner, |pm| pm.analyze(request))
            .map_err(|e| e.in_stage(stage, AgentRole::Planner))?;
        store
            .save_brief(brief.clone())
            .await
            .map_err(commit_failed(stage, AgentRole::Planner))?;
        self.emit(ProgressEvent::completed(
            AgentRole::Planner,
            format!("Brief ready: {} key features", brief.key_features.len()),
            stage.progress(),
        ))
        .await;
        self.pipeline.advance();

        // 2. Designing
        let stage = PipelineStage::Designing;
        tracing::info!(%stage, "Phase started");
        self.emit(ProgressEvent::working(
            AgentRole::Designer,
            "Creating the design system",
            stage.progress(),
        ))
        .await;
        let design = attempt!(retry, self.roster.designer, |ui| ui.create_design(&brief))
            .map_err(|e| e.in_stage(stage, AgentRole::Designer))?;
        store
            .save_design(design.clone())
            .await
            .map_err(commit_failed(stage, AgentRole::Designer))?;
        self.emit(ProgressEvent::completed(
            AgentRole::Designer,
            format!("Design ready: {} components", design.components.len()),
            stage.progress(),
        ))
        .await;
        self.pipeline.advance();

        // 3. Building: frontend, backend and content, concurrently
        let stage = PipelineStage::Building;
        tracing::info!(%stage, "Phase started");
        for (agent, message) in [
            (AgentRole::Frontend, "Generating frontend code"),
            (AgentRole::Backend, "Generating API routes"),
            (AgentRole::Writer, "Writing website copy"),
        ] {
            self.emit(ProgressEvent::working(agent, message, stage.progress()))
                .await;
        }
        let roster = &self.roster;
        let (frontend, backend, content) = tokio::join!(
            async { attempt!(retry, roster.frontend, |dev| dev.generate_code(&brief, &design)) },
            async { attempt!(retry, roster.backend, |dev| dev.generate_apis(&brief)) },
            async { attempt!(retry, roster.writer, |writer| writer.write_content(&brief, &design)) },
        );
        let (frontend, backend, content) = match (frontend, backend, content) {
            (Ok(f), Ok(b), Ok(c)) => (f, b, c),
            (f, b, c) => {
                let mut failures = collect_failures([
                    (stage, AgentRole::Frontend, f.err()),
                    (stage, AgentRole::Backend, b.err()),
                    (stage, AgentRole::Writer, c.err()),
                ]);
                return Err(failures.remove(0));
            }
        };
        store
            .save_frontend_code(frontend.clone())
            .await
            .map_err(commit_failed(stage, AgentRole::Frontend))?;
        store
            .save_backend_code(backend.clone())
            .await
            .map_err(commit_failed(stage, AgentRole::Backend))?;
        store
            .save_content(content)
            .await
            .map_err(commit_failed(stage, AgentRole::Writer))?;
        self.emit(ProgressEvent::completed(
            AgentRole::Frontend,
            format!("{} frontend files", frontend.len()),
            stage.progress(),
        ))
        .await;
        self.emit(ProgressEvent::completed(
            AgentRole::Backend,
            format!("{} backend files", backend.len()),
            stage.progress(),
        ))
        .await;
        self.emit(ProgressEvent::completed(
            AgentRole::Writer,
            "Copy written",
            stage.progress(),
        ))
        .await;
        self.pipeline.advance();

        // 4 + 5. Reviewing and testing, concurrently; both only read code
        let stage = PipelineStage::Reviewing;
        tracing::info!(%stage, "Phase started");
        self.emit(ProgressEvent::working(
            AgentRole::Reviewer,
            "Reviewing code",
            stage.progress(),
        ))
        .await;
        self.emit(ProgressEvent::working(
            AgentRole::Qa,
            "Simulating tests",
            stage.progress(),
        ))
        .await;
        let roster = &self.roster;
        let (review, qa_report) = tokio::join!(
            async { attempt!(retry, roster.reviewer, |reviewer| reviewer.review_code(&frontend, &backend)) },
            async { attempt!(retry, roster.qa, |qa| qa.test(&frontend, &backend)) },
        );
        let (review, qa_report) = match (review, qa_report) {
            (Ok(r), Ok(q)) => (r, q),
            (r, q) => {
                let mut failures = collect_failures([
                    (PipelineStage::Reviewing, AgentRole::Reviewer, r.err()),
                    (PipelineStage::Testing, AgentRole::Qa, q.err()),
                ]);
                return Err(failures.remove(0));
            }
        };
        let qa_status = qa_report.status;
        let bug_count = qa_report.bugs.len();
        store
            .save_qa_report(qa_report)
            .await
            .map_err(commit_failed(PipelineStage::Testing, AgentRole::Qa))?;
        self.emit(ProgressEvent::completed(
            AgentRole::Reviewer,
            format!(
                "Score {} with {} issues",
                review.score,
                review.issues.len()
            ),
            stage.progress(),
        ))
        .await;

        let fixes = if self.config.remediation {
            self.remediate(&review, &frontend, &backend).await?
        } else {
            None
        };
        self.pipeline.advance();

        let stage = PipelineStage::Testing;
        self.emit(ProgressEvent::completed(
            AgentRole::Qa,
            format!("{:?} with {} bugs", qa_status, bug_count),
            stage.progress(),
        ))
        .await;
        self.pipeline.advance();

        // 6. Complete
        store.mark_complete().await;
        let message = format!(
            "Project completed: {} frontend files, {} backend files, review score {}",
            frontend.len(),
            backend.len(),
            review.score
        );
        self.emit(ProgressEvent::completed(
            AgentRole::Qa,
            message.clone(),
            PipelineStage::Complete.progress(),
        ))
        .await;

        Ok(PipelineResult {
            status: SUCCESS.to_string(),
            message,
            final_state: FinalState {
                state: store.state().clone(),
                review,
                fixes,
            },
        })
    }

    /// Hand high-severity review issues to the fixer; `None` when there are none
    async fn remediate(
        &mut self,
        review: &ReviewReport,
        frontend: &[CodeFile],
        backend: &[CodeFile],
    ) -> Result<Option<Vec<CodeFile>>, PipelineError> {
        let issues: Vec<ReviewIssue> = review.high_severity_issues().into_iter().cloned().collect();
        if issues.is_empty() {
            return Ok(None);
        }

        let stage = PipelineStage::Reviewing;
        tracing::info!(issues = issues.len(), "Remediating high-severity issues");
        self.emit(ProgressEvent::working(
            AgentRole::Fixer,
            format!("Fixing {} high-severity issues", issues.len()),
            stage.progress(),
        ))
        .await;

        let files: Vec<CodeFile> = frontend.iter().chain(backend).cloned().collect();
        let retry = self.config.retry_malformed;
        let fixed = attempt!(retry, self.roster.fixer, |fixer| fixer.fix_bugs(&files, &issues))
            .map_err(|e| e.in_stage(stage, AgentRole::Fixer))?;

        self.emit(ProgressEvent::completed(
            AgentRole::Fixer,
            format!("{} files replaced", fixed.len()),
            stage.progress(),
        ))
        .await;
        Ok(Some(fixed))
    }
}
