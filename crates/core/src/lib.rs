//! # Sitesmith Core
//!
//! Turns one natural-language request into a website bundle by driving a
//! fixed pipeline of role agents: a brief, a design system, frontend and
//! backend code, copy, a code review and a QA report.
//!
//! ## Architecture
//!
//! - `llm/` - Structured-completion client and its HTTP / scripted backends
//! - `agents/` - The eight role agents and their personas
//! - `state/` - Project state store and its persistence sinks
//! - `pipeline/` - Stage machine, progress events and the orchestrator
//! - `config` - Pipeline configuration and per-agent model resolution
//! - `export` - Writes a finished run to disk
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sitesmith_core::{Orchestrator, PipelineConfig, ProjectStore};
//!
//! let mut orchestrator = Orchestrator::new(PipelineConfig::default());
//! let mut store = ProjectStore::in_memory();
//! let result = orchestrator
//!     .run_pipeline("A portfolio site for a photographer", &mut store)
//!     .await?;
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, StateError};
pub use pipeline::{Orchestrator, PipelineResult, ProgressEvent};
pub use state::{ProjectState, ProjectStore};
