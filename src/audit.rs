//! Auditing the cache tree.
//!
//! Walks the destination directory and classifies every file against the
//! printer's source and separators:
//!
//! | Status | Meaning |
//! |---|---|
//! | `Valid` | would be served as-is |
//! | `Stale` | older than its source, regenerated on next request |
//! | `Empty` | zero bytes, regenerated on next request |
//! | `Orphaned` | a variant path whose source no longer validates |
//! | `Foreign` | not a variant path at all |
//!
//! In-flight temp files from a concurrent render are skipped. [`prune`]
//! deletes `Stale`, `Empty` and `Orphaned` entries. `Foreign` files are
//! only deleted when asked for explicitly, since the destination may be
//! shared with files the printer did not write.

use crate::handler::ImagePrinter;
use crate::materialize::TEMP_PREFIX;
use crate::request::decode_request;
use crate::staleness::{CacheStatus, check_cache};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to walk cache tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Valid,
    Stale,
    Empty,
    Orphaned,
    Foreign,
}

impl EntryStatus {
    /// Whether [`prune`] deletes entries with this status. Foreign files
    /// only go when `foreign` is set.
    pub fn is_prunable(self, foreign: bool) -> bool {
        match self {
            EntryStatus::Valid => false,
            EntryStatus::Stale | EntryStatus::Empty | EntryStatus::Orphaned => true,
            EntryStatus::Foreign => foreign,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryStatus::Valid => "valid",
            EntryStatus::Stale => "stale",
            EntryStatus::Empty => "empty",
            EntryStatus::Orphaned => "orphaned",
            EntryStatus::Foreign => "foreign",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Path relative to the destination.
    pub path: PathBuf,
    pub status: EntryStatus,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Entries that are not `Valid`.
    pub fn problems(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.status != EntryStatus::Valid)
    }

    /// Entries [`prune`] would delete.
    pub fn removable(&self, foreign: bool) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(move |e| e.status.is_prunable(foreign))
    }
}

/// What [`prune`] deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pruned {
    pub files: usize,
    pub bytes: u64,
}

fn classify(printer: &ImagePrinter, relative: &Path, file: &Path) -> EntryStatus {
    let Some(relative) = relative.to_str() else {
        return EntryStatus::Foreign;
    };
    let Ok(decoded) = decode_request(relative, printer.separators()) else {
        return EntryStatus::Foreign;
    };
    let check = printer.validator().validate(&decoded.source);
    if !check.valid {
        return EntryStatus::Orphaned;
    }
    match check_cache(file, check.modified) {
        CacheStatus::Valid => EntryStatus::Valid,
        CacheStatus::Stale => EntryStatus::Stale,
        CacheStatus::Empty => EntryStatus::Empty,
        // Removed between the walk and the stat.
        CacheStatus::Missing => EntryStatus::Orphaned,
    }
}

/// Classify every file under the printer's destination.
///
/// A destination that does not exist yet yields an empty report.
pub fn audit(printer: &ImagePrinter) -> Result<AuditReport, AuditError> {
    let root = printer.destination();
    let mut report = AuditReport::default();
    if !root.exists() {
        return Ok(report);
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(TEMP_PREFIX))
        {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let status = classify(printer, relative, entry.path());
        debug!(path = %relative.display(), %status, "audited");
        report.entries.push(AuditEntry {
            path: relative.to_path_buf(),
            status,
            size: entry.metadata()?.len(),
        });
    }
    Ok(report)
}

/// Delete the stale, empty and orphaned entries of `report`, plus foreign
/// files when `foreign` is set.
///
/// Entries already gone are not an error.
pub fn prune(
    printer: &ImagePrinter,
    report: &AuditReport,
    foreign: bool,
) -> Result<Pruned, AuditError> {
    let mut pruned = Pruned::default();
    for entry in report.removable(foreign) {
        match std::fs::remove_file(printer.destination().join(&entry.path)) {
            Ok(()) => {
                pruned.files += 1;
                pruned.bytes += entry.size;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(pruned)
}
