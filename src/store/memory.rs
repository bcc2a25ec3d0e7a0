//! In-memory [`IndexStore`] for tests and ephemeral runs
//!
//! Rows live in a `Vec` behind an async `RwLock`. Search is brute-force
//! cosine similarity over every stored vector.

use super::{IndexRow, IndexStore, QueryHit, SourceFilter, StoredMetadata};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

pub struct MemoryStore {
    rows: RwLock<Vec<IndexRow>>,
    extra: RwLock<Vec<StoredMetadata>>,
    mutations: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            extra: RwLock::new(Vec::new()),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Number of `delete_sources`/`upsert` calls that reached the store
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Snapshot of all rows, ordered by id
    pub async fn rows(&self) -> Vec<IndexRow> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// Register metadata of a row written by some other tool
    pub async fn insert_foreign_metadata(&self, meta: StoredMetadata) {
        self.extra.write().await.push(meta);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn all_metadata(&self) -> Result<Vec<StoredMetadata>> {
        let rows = self.rows.read().await;
        let mut all: Vec<StoredMetadata> = rows
            .iter()
            .map(|r| StoredMetadata {
                source: Some(r.metadata.source.clone()),
                last_modified: Some(r.metadata.last_modified),
            })
            .collect();
        all.extend(self.extra.read().await.iter().cloned());
        Ok(all)
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.rows
            .write()
            .await
            .retain(|r| !sources.contains(&r.metadata.source));
        self.extra
            .write()
            .await
            .retain(|m| !m.source.as_ref().is_some_and(|s| sources.contains(s)));
        Ok(())
    }

    async fn upsert(&self, new_rows: Vec<IndexRow>) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;
        for row in new_rows {
            rows.retain(|r| r.id != row.id);
            rows.push(row);
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<QueryHit>> {
        let rows = self.rows.read().await;

        let mut hits: Vec<QueryHit> = rows
            .iter()
            .filter(|r| filter.map_or(true, |f| f.allows(&r.metadata.source)))
            .map(|r| QueryHit {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                score: cosine_sim(&embedding, &r.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
