//! File-backed rule store.
//!
//! # Responsibility
//! - Load, append to and remove from one store file through a `StoreCodec`.
//!
//! # Invariants
//! - Every write is one atomic replace: a temp file in the store's directory
//!   is written, synced and renamed over the store.
//! - `remove` refuses to write when the file no longer matches the snapshot
//!   it was computed from.
//! - A missing file is an error on load and an empty store on append.

use crate::model::rule::Rule;
use crate::store::{ParsedStore, StoreError, StoreFormat, StoreResult};
use log::{info, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Store content as read, plus what it decoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub source: String,
    pub parsed: ParsedStore,
}

/// Persistence interface used by the reminder service.
pub trait RuleStore {
    fn load(&self) -> StoreResult<StoreSnapshot>;
    fn append(&self, rule: &Rule) -> StoreResult<()>;
    /// Removes `rules` (taken from `snapshot`) in one write; returns how many.
    fn remove(&self, snapshot: &StoreSnapshot, rules: &[Rule]) -> StoreResult<usize>;
    /// Human-readable location, for logs and messages.
    fn describe(&self) -> String;
}

/// Rule store kept in one text file.
#[derive(Debug, Clone)]
pub struct FileRuleStore {
    path: PathBuf,
    format: StoreFormat,
}

impl FileRuleStore {
    pub fn new(path: impl Into<PathBuf>, format: StoreFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Store whose format is inferred from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = StoreFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    fn read(&self) -> StoreResult<String> {
        fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn read_or_empty(&self) -> StoreResult<String> {
        match fs::read_to_string(&self.path) {
            Ok(source) => Ok(source),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl RuleStore for FileRuleStore {
    fn load(&self) -> StoreResult<StoreSnapshot> {
        let source = self.read()?;
        let parsed = self.format.codec().parse(&source)?;
        info!(
            "event=store_load module=store status=ok rules={} warnings={}",
            parsed.rules.len(),
            parsed.warnings.len()
        );
        Ok(StoreSnapshot { source, parsed })
    }

    fn append(&self, rule: &Rule) -> StoreResult<()> {
        let started_at = Instant::now();
        let source = self.read_or_empty()?;
        let updated = self.format.codec().append(&source, rule)?;
        write_atomically(&self.path, &updated)?;
        info!(
            "event=store_append module=store status=ok key={} duration_ms={}",
            rule.key.label(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn remove(&self, snapshot: &StoreSnapshot, rules: &[Rule]) -> StoreResult<usize> {
        if rules.is_empty() {
            return Ok(0);
        }

        let started_at = Instant::now();
        let current = self.read()?;
        if current != snapshot.source {
            warn!(
                "event=store_rewrite module=store status=error reason=conflict path={}",
                self.path.display()
            );
            return Err(StoreError::Conflict {
                path: self.path.clone(),
            });
        }

        let updated = self.format.codec().rewrite(&current, rules)?;
        write_atomically(&self.path, &updated)?;
        info!(
            "event=store_rewrite module=store status=ok removed={} duration_ms={}",
            rules.len(),
            started_at.elapsed().as_millis()
        );
        Ok(rules.len())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Replaces `path` with `contents` via temp file + rename in the same directory.
pub fn write_atomically(path: &Path, contents: &str) -> StoreResult<()> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_error)?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(io_error)?;
    temp.write_all(contents.as_bytes()).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_atomically;
    use std::fs;

    #[test]
    fn atomic_write_creates_parent_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("remind.md");
        write_atomically(&path, "[d] one\n").unwrap();
        write_atomically(&path, "[d] two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[d] two\n");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
