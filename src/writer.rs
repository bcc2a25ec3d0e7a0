//! Appending entries to per-date note files

use crate::dates::{parse_date, DATE_FORMAT};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Writes `- <content>` lines into `<notes_dir>/<YYYY-MM-DD>.<ext>`
pub struct ScheduleWriter {
    notes_dir: PathBuf,
    extension: String,
    lock: Mutex<()>,
}

impl ScheduleWriter {
    pub fn new(notes_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            extension: extension.into(),
            lock: Mutex::new(()),
        }
    }

    /// Append `content` as a bullet to the note for `date_str`.
    ///
    /// The date is validated before anything on disk is touched. Returns the
    /// path of the note that was written.
    pub async fn write(&self, date_str: &str, content: &str) -> Result<PathBuf> {
        let date = parse_date(date_str)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidRequest(
                "schedule content must not be empty".to_string(),
            ));
        }

        let path = self
            .notes_dir
            .join(format!("{}.{}", date.format(DATE_FORMAT), self.extension));

        let entry = if content.starts_with('-') {
            content.to_string()
        } else {
            format!("- {}", content)
        };

        let _guard = self.lock.lock().await;

        tokio::fs::create_dir_all(&self.notes_dir)
            .await
            .map_err(|e| Error::file_access(&self.notes_dir, e))?;

        let needs_newline = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::file_access(&path, e)),
        };

        let payload = if needs_newline {
            format!("\n{}", entry)
        } else {
            entry
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::file_access(&path, e))?;
        file.write_all(payload.as_bytes())
            .await
            .map_err(|e| Error::file_access(&path, e))?;
        file.flush()
            .await
            .map_err(|e| Error::file_access(&path, e))?;

        info!("Saved schedule entry to {}", path.display());
        Ok(path)
    }
}
