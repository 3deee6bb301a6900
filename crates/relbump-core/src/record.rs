//! The persisted `{version, hash}` record for a tracked package.
//!
//! The record is read once at the start of a run and replaced wholesale at
//! the end. Writes go through a temp file in the same directory followed by
//! a rename, so a reader never observes a version paired with a stale hash.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Last-known upstream release and the content hash of its source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub hash: String,
}

impl VersionRecord {
    pub fn new(version: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            hash: hash.into(),
        }
    }
}

/// Read and validate the record at `path`.
///
/// Fails if the file is missing, is not a JSON object, or lacks a string
/// `version` or `hash`. Extra keys are ignored.
pub fn load(path: &Path) -> Result<VersionRecord> {
    let bytes = fs::read(path).with_context(|| format!("read version record: {}", path.display()))?;
    let record: VersionRecord = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse version record: {}", path.display()))?;
    Ok(record)
}

/// Atomically replace the record at `path` with `record`.
pub fn save(path: &Path, record: &VersionRecord) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;

    let mut json = serde_json::to_string_pretty(record).context("serialize version record")?;
    json.push('\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace version record: {}", path.display()))?;

    tracing::debug!(path = %path.display(), version = %record.version, "version record saved");
    Ok(())
}
