//! Durable destinations for the ProjectState document.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::db::StateDb;
use super::io::{get_runtime_path, read_optional, write_atomic};
use super::project_state::ProjectState;

/// Where a [`ProjectStore`](super::ProjectStore) mirrors its state.
///
/// `persist` overwrites the previous document; nothing is versioned.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn persist(&self, state: &ProjectState) -> Result<()>;

    /// Last persisted document, if any
    async fn load(&self) -> Result<Option<ProjectState>>;
}

// ============================================================================
// JSON file
// ============================================================================

/// One pretty-printed JSON document, replaced atomically on every write
pub struct JsonFileSink {
    path: PathBuf,
    /// Serializes writes from runs sharing this sink
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `.sitesmith/project-state.json`
    pub fn default_location() -> Self {
        Self::new(get_runtime_path().join("project-state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateSink for JsonFileSink {
    async fn persist(&self, state: &ProjectState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, &json).await?;
        tracing::debug!(path = %self.path.display(), step = %state.step, "State saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<ProjectState>> {
        read_optional(&self.path)
            .await?
            .map(|json| {
                serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt state file: {:?}", self.path))
            })
            .transpose()
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// One row per run in the run database
pub struct SqliteSink {
    db: Arc<StateDb>,
    run_id: String,
    request: Option<String>,
}

impl SqliteSink {
    pub fn new(db: Arc<StateDb>, run_id: impl Into<String>) -> Self {
        Self {
            db,
            run_id: run_id.into(),
            request: None,
        }
    }

    /// Fresh run id for a new request
    pub fn for_request(db: Arc<StateDb>, request: &str) -> Self {
        Self {
            request: Some(request.to_string()),
            ..Self::new(db, uuid::Uuid::new_v4().to_string())
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

#[async_trait]
impl StateSink for SqliteSink {
    async fn persist(&self, state: &ProjectState) -> Result<()> {
        self.db
            .save_run(&self.run_id, self.request.as_deref(), state)
    }

    async fn load(&self) -> Result<Option<ProjectState>> {
        self.db.load_run(&self.run_id)
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Keeps the last written document in memory
#[derive(Default)]
pub struct MemorySink {
    last: Mutex<Option<ProjectState>>,
    writes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<ProjectState> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl StateSink for MemorySink {
    async fn persist(&self, state: &ProjectState) -> Result<()> {
        *self
            .last
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))? = Some(state.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Option<ProjectState>> {
        Ok(self.last())
    }
}
