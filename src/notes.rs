//! Note file discovery
//!
//! A note is a regular file directly inside the notes directory whose
//! extension is in the configured allow-list. Its `source` is the full path
//! string, which is also the key stored in every index row.

use crate::dates::extract_date_from_filename;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A note file found on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteFile {
    pub path: PathBuf,

    /// Path string used as the `source` key in the index
    pub source: String,

    /// Modification time, seconds since the Unix epoch
    pub modified: f64,
}

impl NoteFile {
    /// Calendar date encoded in the file name, if any
    pub fn date(&self) -> Option<NaiveDate> {
        extract_date_from_filename(&self.source)
    }
}

/// Source key for a path, shared by the indexer and the orchestrator
pub fn source_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Does the extension of `path` appear in `extensions` (case-insensitive)?
pub fn has_note_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// List the note files at the top level of `dir`, sorted by path.
///
/// Fails if the directory itself cannot be read. Entries whose metadata
/// cannot be read are skipped with a warning.
pub fn scan_notes(dir: &Path, extensions: &[String]) -> Result<Vec<NoteFile>> {
    let meta = std::fs::metadata(dir).map_err(|e| Error::file_access(dir, e))?;
    if !meta.is_dir() {
        return Err(Error::InvalidConfiguration(format!(
            "Notes path is not a directory: {}",
            dir.display()
        )));
    }

    let mut notes = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_note_extension(entry.path(), extensions) {
            continue;
        }

        let modified = match entry
            .metadata()
            .map_err(std::io::Error::from)
            .and_then(|m| m.modified())
        {
            Ok(time) => system_time_secs(time),
            Err(e) => {
                warn!("Skipping {}: cannot read mtime: {}", entry.path().display(), e);
                continue;
            }
        };

        let path = entry.into_path();
        notes.push(NoteFile {
            source: source_key(&path),
            path,
            modified,
        });
    }

    debug!("Found {} note files in {}", notes.len(), dir.display());
    Ok(notes)
}

fn system_time_secs(time: std::time::SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Sources whose file-name date falls inside `[start, end]`
pub fn sources_in_range(notes: &[NoteFile], start: NaiveDate, end: NaiveDate) -> Vec<String> {
    notes
        .iter()
        .filter(|n| n.date().is_some_and(|d| start <= d && d <= end))
        .map(|n| n.source.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["txt".to_string(), "md".to_string()]
    }

    #[test]
    fn test_scan_filters_extensions_and_depth() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("2024-06-01.txt"), "- a").unwrap();
        std::fs::write(tmp.path().join("2024-06-02.MD"), "- b").unwrap();
        std::fs::write(tmp.path().join("photo.png"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("archive")).unwrap();
        std::fs::write(tmp.path().join("archive/2023-01-01.txt"), "- old").unwrap();

        let notes = scan_notes(tmp.path(), &exts()).unwrap();
        let names: Vec<_> = notes
            .iter()
            .map(|n| n.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["2024-06-01.txt", "2024-06-02.MD"]);
        assert!(notes.iter().all(|n| n.modified > 0.0));
        assert_eq!(notes[0].source, source_key(&tmp.path().join("2024-06-01.txt")));
    }

    #[test]
    fn test_missing_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = scan_notes(&tmp.path().join("nope"), &exts()).unwrap_err();
        assert!(matches!(err, Error::FileAccess { .. }));
    }

    #[test]
    fn test_sources_in_range() {
        let tmp = TempDir::new().unwrap();
        for name in ["2024-06-09.txt", "2024-06-10.txt", "2024-06-16.md", "2024-06-17.txt", "notes.txt"] {
            std::fs::write(tmp.path().join(name), "- x").unwrap();
        }
        let notes = scan_notes(tmp.path(), &exts()).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        let sources = sources_in_range(&notes, start, end);

        assert_eq!(sources.len(), 2);
        assert!(sources[0].ends_with("2024-06-10.txt"));
        assert!(sources[1].ends_with("2024-06-16.md"));
    }
}
