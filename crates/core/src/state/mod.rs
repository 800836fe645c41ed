pub mod db;
pub mod io;
pub mod project_state;
pub mod sinks;
pub mod store;

pub use db::{RunSummary, StateDb};
pub use project_state::{CodeState, ProjectState, Step};
pub use sinks::{JsonFileSink, MemorySink, SqliteSink, StateSink};
pub use store::ProjectStore;
