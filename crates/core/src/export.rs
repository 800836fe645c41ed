//! # Bundle Export
//!
//! Writes a finished run to disk:
//!
//! ```text
//! <dir>/
//!   frontend/<path>    one file per generated frontend file
//!   backend/<path>     one file per generated backend file
//!   fixes/<path>       remediation output, when present
//!   content.json       website copy
//!   review.json        code review
//!   qa.json            QA report
//!   metadata.json      request, run id, timestamp
//! ```
//!
//! [`zip_bundle`] packs the same layout into one archive for download.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::pipeline::PipelineResult;
use crate::types::CodeFile;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub request: String,
    pub run_id: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl BundleMetadata {
    pub fn new(request: impl Into<String>, run_id: Option<String>) -> Self {
        Self {
            request: request.into(),
            run_id,
            generated_at: Utc::now(),
        }
    }
}

/// What [`write_bundle`] put on disk
#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleSummary {
    pub files_written: usize,
    pub root: PathBuf,
}

/// Reject paths that are absolute or climb out of the bundle
pub fn safe_relative_path(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("Refusing to write outside the bundle: {}", path)
            }
        }
    }
    if clean.as_os_str().is_empty() {
        bail!("Empty file path");
    }
    Ok(clean)
}

/// One file of the bundle, relative to its root
struct Entry {
    path: PathBuf,
    bytes: Vec<u8>,
}

fn code_entries(entries: &mut Vec<Entry>, subdir: &str, files: &[CodeFile]) -> Result<()> {
    for file in files {
        entries.push(Entry {
            path: Path::new(subdir).join(safe_relative_path(&file.path)?),
            bytes: file.content.clone().into_bytes(),
        });
    }
    Ok(())
}

fn json_entry<T: Serialize>(name: &str, value: &T) -> Result<Entry> {
    Ok(Entry {
        path: PathBuf::from(name),
        bytes: serde_json::to_vec_pretty(value)?,
    })
}

/// Every bundle file, with each generated path validated before anything is written
fn bundle_entries(result: &PipelineResult, metadata: &BundleMetadata) -> Result<Vec<Entry>> {
    let final_state = &result.final_state;
    let code = &final_state.state.code;

    let mut entries = Vec::new();
    if let Some(files) = &code.frontend {
        code_entries(&mut entries, "frontend", files)?;
    }
    if let Some(files) = &code.backend {
        code_entries(&mut entries, "backend", files)?;
    }
    if let Some(files) = &final_state.fixes {
        code_entries(&mut entries, "fixes", files)?;
    }

    if let Some(content) = &final_state.state.content {
        entries.push(json_entry("content.json", content)?);
    }
    entries.push(json_entry("review.json", &final_state.review)?);
    if let Some(qa) = &final_state.state.qa_report {
        entries.push(json_entry("qa.json", qa)?);
    }
    entries.push(json_entry("metadata.json", metadata)?);
    Ok(entries)
}

fn is_code(entry: &Entry) -> bool {
    entry.path.components().count() > 1
}

/// Write the generated files and reports of `result` under `dir`
pub async fn write_bundle(
    result: &PipelineResult,
    metadata: &BundleMetadata,
    dir: &Path,
) -> Result<BundleSummary> {
    let entries = bundle_entries(result, metadata)?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create bundle directory: {:?}", dir))?;

    for entry in &entries {
        let target = dir.join(&entry.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory for {:?}", entry.path))?;
        }
        tokio::fs::write(&target, &entry.bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", entry.path))?;
    }

    let files_written = entries.iter().filter(|e| is_code(e)).count();
    tracing::info!(dir = %dir.display(), files_written, "Bundle written");
    Ok(BundleSummary {
        files_written,
        root: dir.to_path_buf(),
    })
}

/// The same layout as [`write_bundle`], packed into an in-memory zip archive
pub fn zip_bundle(result: &PipelineResult, metadata: &BundleMetadata) -> Result<Vec<u8>> {
    let entries = bundle_entries(result, metadata)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in &entries {
        // zip entry names always use forward slashes
        let name = entry
            .path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        writer.write_all(&entry.bytes)?;
    }
    let archive = writer.finish().context("Failed to finish archive")?;

    tracing::info!(entries = entries.len(), "Bundle archived");
    Ok(archive.into_inner())
}
