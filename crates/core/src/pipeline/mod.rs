//! # Pipeline
//!
//! ```text
//! request ─► Planning ─► Designing ─► Building ─────────► Reviewing ─► Complete
//!            (planner)   (designer)   ┌ frontend ┐        ┌ reviewer ┐
//!                                     ├ backend  ├ join   └ qa       ┘ join
//!                                     └ writer   ┘
//! ```
//!
//! The [`Orchestrator`] owns the stage machine and the roster; the caller
//! owns the [`ProjectStore`](crate::state::ProjectStore) of the run.

pub mod events;
pub mod orchestrator;
pub mod stage;

pub use events::{AgentStatus, ProgressEvent};
pub use orchestrator::{FinalState, Orchestrator, PipelineResult, SUCCESS};
pub use stage::{Pipeline, PipelineStage};
