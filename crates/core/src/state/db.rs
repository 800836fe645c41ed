//! # Run Database
//!
//! SQLite persistence for pipeline runs at `.sitesmith/sitesmith.db`.
//! One row per run id holding the latest ProjectState document and, once
//! the run succeeds, its full result.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::io::get_runtime_path;
use super::project_state::ProjectState;
use crate::pipeline::PipelineResult;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 3;

/// Row summary for listing runs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub step: String,
    pub request: Option<String>,
    pub updated_at: String,
}

pub struct StateDb {
    conn: Arc<Mutex<Connection>>,
}

impl StateDb {
    /// Open or create the database in the runtime directory
    pub fn open() -> Result<Self> {
        Self::open_at(get_runtime_path().join("sitesmith.db"))
    }

    /// Open database at a specific path (useful for testing)
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path.as_ref()).context("Failed to open sitesmith database")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?)
    }

    /// Run schema migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }
        if current_version < 2 {
            Self::migrate_v2(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [2],
            )?;
        }
        if current_version < SCHEMA_VERSION {
            Self::migrate_v3(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    /// Migration to version 1 - runs table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS project_runs (
                run_id TEXT PRIMARY KEY,
                step TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    /// Migration to version 2 - keep the originating request
    fn migrate_v2(conn: &Connection) -> Result<()> {
        conn.execute("ALTER TABLE project_runs ADD COLUMN request TEXT", [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_project_runs_updated ON project_runs(updated_at)",
            [],
        )?;
        Ok(())
    }

    /// Migration to version 3 - full result of successful runs
    fn migrate_v3(conn: &Connection) -> Result<()> {
        conn.execute("ALTER TABLE project_runs ADD COLUMN result TEXT", [])?;
        Ok(())
    }

    /// Insert or overwrite the document for `run_id`; a stored result is kept
    pub fn save_run(&self, run_id: &str, request: Option<&str>, state: &ProjectState) -> Result<()> {
        let data = serde_json::to_string(state)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO project_runs (run_id, step, data, updated_at, request)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(run_id) DO UPDATE SET
                step = excluded.step,
                data = excluded.data,
                updated_at = excluded.updated_at,
                request = COALESCE(excluded.request, project_runs.request)
            "#,
            params![
                run_id,
                state.step.to_string(),
                data,
                chrono::Utc::now().to_rfc3339(),
                request
            ],
        )
        .context("Failed to save project state")?;
        Ok(())
    }

    pub fn load_run(&self, run_id: &str) -> Result<Option<ProjectState>> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM project_runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).context("Corrupt project state row"))
            .transpose()
    }

    /// Attach the final result to an existing run row
    pub fn save_result(&self, run_id: &str, result: &PipelineResult) -> Result<()> {
        let data = serde_json::to_string(result)?;
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE project_runs SET result = ?2 WHERE run_id = ?1",
                params![run_id, data],
            )
            .context("Failed to save run result")?;
        if updated == 0 {
            anyhow::bail!("No run with id {}", run_id);
        }
        Ok(())
    }

    /// Final result of `run_id`; `None` for unknown or unfinished runs
    pub fn load_result(&self, run_id: &str) -> Result<Option<PipelineResult>> {
        let conn = self.lock()?;
        let data: Option<Option<String>> = conn
            .query_row(
                "SELECT result FROM project_runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        data.flatten()
            .map(|d| serde_json::from_str(&d).context("Corrupt run result row"))
            .transpose()
    }

    /// Most recently written run
    pub fn latest_run(&self) -> Result<Option<(String, ProjectState)>> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT run_id, data FROM project_runs ORDER BY updated_at DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(id, data)| {
            serde_json::from_str(&data)
                .map(|state| (id, state))
                .context("Corrupt project state row")
        })
        .transpose()
    }

    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, step, request, updated_at FROM project_runs ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], summary_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list runs")
    }

    pub fn run_summary(&self, run_id: &str) -> Result<Option<RunSummary>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT run_id, step, request, updated_at FROM project_runs WHERE run_id = ?1",
            params![run_id],
            summary_row,
        )
        .optional()
        .context("Failed to read run")
    }
}

fn summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunSummary> {
    Ok(RunSummary {
        run_id: row.get(0)?,
        step: row.get(1)?,
        request: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
