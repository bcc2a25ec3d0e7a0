//! Vector index storage
//!
//! This module provides:
//! - The `IndexStore` trait the indexer and orchestrator talk to
//! - `QdrantStore`, the production adapter (collection management, scroll,
//!   filtered delete, upsert, filtered search)
//! - `MemoryStore`, a brute-force cosine store for tests and ephemeral runs

mod memory;
mod payload;

pub use memory::*;
pub use payload::*;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetCollectionInfoResponse, PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::Serialize;
use tracing::{debug, info};

/// Metadata attached to every index row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMetadata {
    pub source: String,
    pub last_modified: f64,
}

/// Metadata as found in the store; older or foreign rows may miss fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredMetadata {
    pub source: Option<String>,
    pub last_modified: Option<f64>,
}

/// One chunk ready to be written
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: RowMetadata,
    pub chunk_index: usize,
}

/// A search result
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: RowMetadata,
    pub score: f32,
}

/// Restrict a search to rows whose `source` is in the set
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub sources: Vec<String>,
}

impl SourceFilter {
    pub fn new(sources: Vec<String>) -> Self {
        Self { sources }
    }

    pub fn allows(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    fn to_qdrant_filter(&self) -> Filter {
        Filter::must([Condition::matches("source", self.sources.clone())])
    }
}

/// Trait for vector index backends
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Metadata of every stored row
    async fn all_metadata(&self) -> Result<Vec<StoredMetadata>>;

    /// Remove every row whose `source` is in `sources`
    async fn delete_sources(&self, sources: &[String]) -> Result<()>;

    /// Insert or replace rows by id
    async fn upsert(&self, rows: Vec<IndexRow>) -> Result<()>;

    /// Nearest rows to `embedding`, most similar first
    async fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<QueryHit>>;
}

/// Information about a Qdrant collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub status: String,
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(
            &config.qdrant_url,
            config.qdrant_api_key(),
            &config.collection_name,
            config.embedding.dimension,
        )
        .await
    }

    /// Create a new store connection directly with URL and collection name
    pub async fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Connect and make sure the collection exists
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Self::connect(config).await?;
        store.ensure_collection().await?;
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ensure the collection exists with cosine distance and the configured dimension
    pub async fn ensure_collection(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            debug!("Collection {} already exists", self.collection);

            let info = self.client.collection_info(&self.collection).await?;
            if let Some(size) = extract_vector_size(&info) {
                if size as usize != self.dimension {
                    return Err(Error::Qdrant(format!(
                        "Collection '{}' has vector size {}, but embedding.dimension is {}. Remediation: set a new collection name or delete the collection and reindex.",
                        self.collection, size, self.dimension
                    )));
                }
            }
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await?;

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    /// Get collection info (point count, etc)
    pub async fn get_collection_info(&self) -> Result<Option<CollectionInfo>> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(&self.collection).await?;
        Ok(info.result.map(|result| CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            status: format!("{:?}", result.status()),
        }))
    }
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<u64> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => Some(params.size),
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

#[async_trait]
impl IndexStore for QdrantStore {
    async fn all_metadata(&self) -> Result<Vec<StoredMetadata>> {
        let mut all = Vec::new();
        let mut offset: Option<PointId> = None;
        let batch_size = 1000u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(true)
                .with_vectors(false);

            if let Some(ref o) = offset {
                scroll_builder = scroll_builder.offset(o.clone());
            }

            let response = self.client.scroll(scroll_builder).await?;
            if response.result.is_empty() {
                break;
            }

            for point in response.result {
                let payload = RowPayload::from_json(&payload_to_json(point.payload));
                all.push(payload.stored_metadata());
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        debug!("Scrolled {} rows from {}", all.len(), self.collection);
        Ok(all)
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting rows of {} sources from collection {}",
            sources.len(),
            self.collection
        );

        let filter = SourceFilter::new(sources.to_vec()).to_qdrant_filter();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await?;

        Ok(())
    }

    async fn upsert(&self, rows: Vec<IndexRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        if let Some(mismatch) = rows.iter().find(|r| r.embedding.len() != self.dimension) {
            return Err(Error::Qdrant(format!(
                "Vector dimension mismatch for collection '{}': expected {} (got {})",
                self.collection,
                self.dimension,
                mismatch.embedding.len()
            )));
        }

        debug!(
            "Upserting {} points to collection {}",
            rows.len(),
            self.collection
        );

        let points: Vec<PointStruct> = rows.into_iter().map(row_to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;

        Ok(())
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<QueryHit>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, top_k
        );

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, embedding, top_k as u64).with_payload(true);

        if let Some(f) = filter {
            search_builder = search_builder.filter(f.to_qdrant_filter());
        }

        let response = self.client.search_points(search_builder).await?;

        Ok(response
            .result
            .into_iter()
            .map(|p| RowPayload::from_json(&payload_to_json(p.payload)).into_hit(p.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_filter_to_qdrant() {
        let filter = SourceFilter::new(vec!["/n/2024-06-01.txt".into(), "/n/2024-06-02.txt".into()]);
        let qdrant_filter = filter.to_qdrant_filter();
        assert_eq!(qdrant_filter.must.len(), 1);
        assert!(filter.allows("/n/2024-06-02.txt"));
        assert!(!filter.allows("/n/2024-06-03.txt"));
    }

    #[tokio::test]
    async fn test_upsert_rejects_dimension_mismatch() {
        let store = QdrantStore::new("http://127.0.0.1:6334", None, "test_collection", 3)
            .await
            .expect("store should initialize");

        let row = IndexRow {
            id: "doc_1_0_0".to_string(),
            embedding: vec![0.1, 0.2],
            document: "- lunch".to_string(),
            metadata: RowMetadata {
                source: "/n/2024-06-01.txt".to_string(),
                last_modified: 1.0,
            },
            chunk_index: 0,
        };

        let err = store
            .upsert(vec![row])
            .await
            .expect_err("should reject mismatched vector length");

        match err {
            Error::Qdrant(message) => assert!(message.contains("Vector dimension mismatch")),
            other => panic!("expected qdrant error, got {other:?}"),
        }
    }
}
