//! Session snapshot files: the queue as `[{chosen_format, end_time, start_time, url}]`.
//!
//! One file per session, named after the local time it was opened
//! (`YYYY-MM-DD_HH-MM-SS.json`), rewritten atomically on every queue mutation
//! and loadable later to re-submit the same batch.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::item::Item;
use crate::storage;

/// File name pattern (chrono strftime) for session snapshots.
pub const SESSION_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One queued request as persisted. Times are kept as text so a hand-edited
/// file with a bad time surfaces as a submission error, not a load failure.
/// Fields are declared in key order so the JSON comes out with sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub chosen_format: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    pub url: String,
}

impl SessionEntry {
    pub fn from_item(item: &Item) -> Self {
        Self {
            chosen_format: item.chosen_format().to_string(),
            end_time: Some(item.end_time().to_string()),
            start_time: Some(item.start_time().to_string()),
            url: item.url().to_string(),
        }
    }
}

/// File name for a session opened at `at`.
pub fn session_file_name<Tz>(at: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}.json", at.format(SESSION_NAME_FORMAT))
}

/// Path for a new session file in `dir`, named after the current local time.
pub fn new_session_path(dir: &Path) -> PathBuf {
    dir.join(session_file_name(&chrono::Local::now()))
}

/// Serializes entries with four-space indentation.
pub fn to_json(entries: &[SessionEntry]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries
        .serialize(&mut ser)
        .context("serialize session")?;
    Ok(buf)
}

/// Writes the snapshot atomically.
pub fn save(path: &Path, entries: &[SessionEntry]) -> Result<()> {
    let json = to_json(entries)?;
    storage::write_atomic(path, &json)
        .with_context(|| format!("write session: {}", path.display()))
}

pub fn load(path: &Path) -> Result<Vec<SessionEntry>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read session: {}", path.display()))?;
    let entries: Vec<SessionEntry> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse session: {}", path.display()))?;
    Ok(entries)
}

/// Session files in `dir`, oldest first (names sort chronologically).
/// A missing directory yields an empty list.
pub fn list_sessions(dir: &Path) -> Result<Vec<PathBuf>> {
    let read = match std::fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("list sessions: {}", dir.display())),
    };
    let mut out: Vec<PathBuf> = read
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    out.sort();
    Ok(out)
}
