//! Incremental reconciliation of the notes directory with the index
//!
//! Every run compares the note files on disk with the `{source,
//! last_modified}` metadata in the store:
//! - a file the store has never seen is added
//! - a file whose mtime is newer than the stored one is deleted, then re-added
//! - a stored source with no file on disk is deleted
//!
//! All deletes go out first as one filtered delete. A file that cannot be
//! read or embedded is skipped and retried on the next run.

use crate::chunk::chunk_document;
use crate::config::{ChunkConfig, Config};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::notes::{scan_notes, NoteFile};
use crate::store::{IndexRow, IndexStore, RowMetadata, StoredMetadata};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What a reconciliation run has to do
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcilePlan {
    /// Files the store has never seen
    pub to_add: Vec<NoteFile>,
    /// Files changed since they were indexed
    pub to_update: Vec<NoteFile>,
    /// Stored sources with no file on disk
    pub to_remove: Vec<String>,
    /// Files already up to date
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Sources to delete before writing: updated files and removed ones
    pub fn deletions(&self) -> Vec<String> {
        self.to_update
            .iter()
            .map(|n| n.source.clone())
            .chain(self.to_remove.iter().cloned())
            .collect()
    }
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub chunks_written: usize,
    /// Sources skipped because they could not be read or embedded
    pub failed: Vec<String>,
}

/// Collapse row metadata into one `last_modified` per source.
///
/// Rows without a source are ignored. Rows without a `last_modified` count
/// as never indexed (0.0). When rows of one source disagree, the oldest wins
/// so the file gets refreshed.
pub fn stored_sources(rows: &[StoredMetadata]) -> HashMap<String, f64> {
    let mut map: HashMap<String, f64> = HashMap::new();
    for row in rows {
        let Some(ref source) = row.source else {
            continue;
        };
        let modified = row.last_modified.unwrap_or(0.0);
        map.entry(source.clone())
            .and_modify(|m| *m = m.min(modified))
            .or_insert(modified);
    }
    map
}

/// Decide what to add, refresh and remove. Pure; touches nothing.
pub fn plan(disk: &[NoteFile], stored: &HashMap<String, f64>) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();

    for note in disk {
        match stored.get(&note.source) {
            None => result.to_add.push(note.clone()),
            Some(&indexed) if note.modified > indexed => result.to_update.push(note.clone()),
            Some(_) => result.unchanged += 1,
        }
    }

    let on_disk: HashSet<&str> = disk.iter().map(|n| n.source.as_str()).collect();
    let mut gone: Vec<String> = stored
        .keys()
        .filter(|s| !on_disk.contains(s.as_str()))
        .cloned()
        .collect();
    gone.sort();
    result.to_remove = gone;

    result
}

pub struct Indexer {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    notes_dir: PathBuf,
    extensions: Vec<String>,
    chunk: ChunkConfig,
    /// Serializes runs and holds the id of the last run
    last_run: Mutex<i64>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        notes_dir: impl Into<PathBuf>,
        extensions: Vec<String>,
        chunk: ChunkConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            notes_dir: notes_dir.into(),
            extensions,
            chunk,
            last_run: Mutex::new(0),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::new(
            store,
            embedder,
            config.notes_dir(),
            config.notes.extensions.clone(),
            config.chunk.clone(),
        )
    }

    /// Work a run would do right now, without changing the store
    pub async fn pending(&self) -> Result<ReconcilePlan> {
        let disk = scan_notes(&self.notes_dir, &self.extensions)?;
        let stored = stored_sources(&self.store.all_metadata().await?);
        Ok(plan(&disk, &stored))
    }

    pub async fn run(&self) -> Result<IndexReport> {
        self.run_with_progress(None).await
    }

    /// Reconcile once. Concurrent calls on the same indexer run one after another.
    pub async fn run_with_progress(&self, progress: Option<&ProgressBar>) -> Result<IndexReport> {
        let mut last_run = self.last_run.lock().await;

        let plan = self.pending().await?;
        let mut report = IndexReport {
            removed: plan.to_remove.len(),
            unchanged: plan.unchanged,
            ..Default::default()
        };

        if plan.is_noop() {
            debug!("Index is up to date ({} files)", plan.unchanged);
            return Ok(report);
        }

        let deletions = plan.deletions();
        if !deletions.is_empty() {
            debug!("Deleting rows for {} sources", deletions.len());
            self.store.delete_sources(&deletions).await?;
        }

        // Strictly increasing so ids never repeat, even for runs in the same millisecond
        let run_id = chrono::Utc::now().timestamp_millis().max(*last_run + 1);
        *last_run = run_id;
        let work: Vec<(&NoteFile, bool)> = plan
            .to_add
            .iter()
            .map(|n| (n, false))
            .chain(plan.to_update.iter().map(|n| (n, true)))
            .collect();

        if let Some(pb) = progress {
            pb.set_length(work.len() as u64);
        }

        for (seq, (note, is_update)) in work.into_iter().enumerate() {
            match self.index_file(note, run_id, seq).await {
                Ok(written) => {
                    report.chunks_written += written;
                    if is_update {
                        report.updated += 1;
                    } else {
                        report.added += 1;
                    }
                }
                Err(e) if is_per_file(&e) => {
                    warn!("Skipping {}: {}", note.source, e);
                    report.failed.push(note.source.clone());
                }
                Err(e) => return Err(e),
            }

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            chunks = report.chunks_written,
            failed = report.failed.len(),
            "Index reconciled"
        );

        Ok(report)
    }

    async fn index_file(&self, note: &NoteFile, run_id: i64, seq: usize) -> Result<usize> {
        let last_modified = tokio::fs::metadata(&note.path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| Error::file_access(&note.path, e))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(note.modified);

        let text = tokio::fs::read_to_string(&note.path)
            .await
            .map_err(|e| Error::file_access(&note.path, e))?;

        let chunks = chunk_document(&text, &note.source, last_modified, &self.chunk)?;
        if chunks.is_empty() {
            self.index_empty_file(note, last_modified, run_id, seq).await?;
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let rows: Vec<IndexRow> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexRow {
                id: format!("doc_{}_{}_{}", run_id, seq, chunk.chunk_index),
                embedding,
                document: chunk.text,
                metadata: RowMetadata {
                    source: chunk.source_path,
                    last_modified: chunk.last_modified,
                },
                chunk_index: chunk.chunk_index,
            })
            .collect();

        let written = rows.len();
        self.store.upsert(rows).await?;
        debug!("Indexed {} ({} chunks)", note.source, written);
        Ok(written)
    }

    /// An empty note still gets one row with an empty document, so its
    /// `{source, last_modified}` is in the store and the file counts as
    /// indexed. The vector is the file name's embedding.
    async fn index_empty_file(
        &self,
        note: &NoteFile,
        last_modified: f64,
        run_id: i64,
        seq: usize,
    ) -> Result<()> {
        let name = note
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| note.source.clone());

        let embedding = self
            .embedder
            .embed(vec![name])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for empty note".to_string()))?;

        self.store
            .upsert(vec![IndexRow {
                id: format!("doc_{}_{}_0", run_id, seq),
                embedding,
                document: String::new(),
                metadata: RowMetadata {
                    source: note.source.clone(),
                    last_modified,
                },
                chunk_index: 0,
            }])
            .await?;
        debug!("{} is empty, stored a marker row", note.source);
        Ok(())
    }
}

/// Errors that only affect one file
fn is_per_file(err: &Error) -> bool {
    matches!(err, Error::FileAccess { .. } | Error::Embedding(_))
}
