//! JSON persistence for [`ResultContainer`]s.
//!
//! A container is written as a single JSON array. Each dump also drops a
//! snapshot into a backups directory, named
//! `<kind>_<UTC timestamp>_<uuid>.json`, and prunes the oldest snapshots
//! of that kind beyond [`BackupPolicy::max_backups`].
//!
//! The primary file is replaced by writing a sibling temp file and
//! renaming it over the target, so a failed dump leaves the previous
//! file intact. A failed backup is logged and does not fail the dump.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::container::ResultContainer;
use crate::error::PersistenceError;
use crate::models::{ContentKind, Item};

pub const DEFAULT_MAX_BACKUPS: usize = 100;

/// Where backup snapshots go and how many to keep per kind.
#[derive(Debug, Clone)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    pub max_backups: usize,
}

impl BackupPolicy {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

/// Result of a successful [`ResultContainer::dump`].
#[derive(Debug)]
pub struct DumpOutcome {
    pub path: PathBuf,
    pub items: usize,
    /// The snapshot written, or `None` if the backup step failed.
    pub backup: Option<PathBuf>,
    /// Old snapshots removed by rotation.
    pub pruned: usize,
}

/// Result of a successful [`ResultContainer::load`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Array entries in the file.
    pub found: usize,
    pub accepted: usize,
    /// Entries that failed to decode or were rejected by the container.
    pub discarded: usize,
}

impl ResultContainer {
    /// Write every accepted item to `path` as a JSON array and snapshot
    /// it into `backups.dir`.
    pub fn dump(&self, path: &Path, backups: &BackupPolicy) -> Result<DumpOutcome, PersistenceError> {
        let json = serde_json::to_vec_pretty(self.items()).map_err(|source| {
            PersistenceError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;

        write_atomic(path, &json)?;
        info!("Saved {} {} to {}", self.len(), self.kind().plural(), path.display());

        let (backup, pruned) = match write_backup(self.kind(), &json, backups) {
            Ok((snapshot, pruned)) => (Some(snapshot), pruned),
            Err(e) => {
                warn!("Backup of {} skipped: {}", self.kind().plural(), e);
                (None, 0)
            }
        };

        Ok(DumpOutcome {
            path: path.to_path_buf(),
            items: self.len(),
            backup,
            pruned,
        })
    }

    /// Read a JSON array from `path` and [`add`](ResultContainer::add)
    /// every element. Invalid elements are dropped.
    pub fn load(&mut self, path: &Path) -> Result<LoadOutcome, PersistenceError> {
        let raw = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|source| PersistenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let entries = match value {
            Value::Array(entries) => entries,
            other => {
                return Err(PersistenceError::NotAnArray {
                    path: path.to_path_buf(),
                    found: json_type(&other),
                })
            }
        };

        info!(
            "Loading data... {} objects found, proceeding to validate.",
            entries.len()
        );

        let mut outcome = LoadOutcome {
            found: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            match serde_json::from_value::<Item>(entry) {
                Ok(item) => {
                    if self.add(item) {
                        outcome.accepted += 1;
                    } else {
                        outcome.discarded += 1;
                    }
                }
                Err(e) => {
                    warn!("Discarding malformed entry in {}: {}", path.display(), e);
                    outcome.discarded += 1;
                }
            }
        }
        Ok(outcome)
    }
}

/// File name of a backup snapshot taken at `at`.
pub fn backup_file_name(kind: ContentKind, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.json",
        kind.plural(),
        at.format("%Y%m%dT%H%M%S%.6fZ"),
        Uuid::new_v4().simple()
    )
}

/// Snapshots of `kind` in `dir`, oldest first.
pub fn list_backups(dir: &Path, kind: ContentKind) -> Result<Vec<PathBuf>, PersistenceError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}_", kind.plural());
    let mut backups = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PersistenceError::io(dir, e))? {
        let entry = entry.map_err(|e| PersistenceError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.ends_with(".json") {
            backups.push(entry.path());
        }
    }
    // Names embed the timestamp, so lexical order is chronological.
    backups.sort();
    Ok(backups)
}

fn write_backup(
    kind: ContentKind,
    json: &[u8],
    policy: &BackupPolicy,
) -> Result<(PathBuf, usize), PersistenceError> {
    fs::create_dir_all(&policy.dir).map_err(|e| PersistenceError::io(&policy.dir, e))?;
    let snapshot = policy.dir.join(backup_file_name(kind, Utc::now()));
    fs::write(&snapshot, json).map_err(|e| PersistenceError::io(&snapshot, e))?;

    let backups = list_backups(&policy.dir, kind)?;
    let excess = backups.len().saturating_sub(policy.max_backups);
    for old in &backups[..excess] {
        fs::remove_file(old).map_err(|e| PersistenceError::io(old, e))?;
    }
    Ok((snapshot, excess))
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
    replace_via(&tmp, path, bytes)
}

/// Write `bytes` to `tmp`, then rename it over `path`. `path` is only
/// touched by the rename.
fn replace_via(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    fs::write(tmp, bytes).map_err(|e| PersistenceError::io(tmp, e))?;
    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err(PersistenceError::io(path, e));
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
