//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::indexer::{plan, Indexer, ReconcilePlan};
use crate::notes::scan_notes;
use crate::store::QdrantStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Counts of the work the next index run would do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWork {
    pub to_add: usize,
    pub to_update: usize,
    pub to_remove: usize,
    pub unchanged: usize,
}

impl From<&ReconcilePlan> for PendingWork {
    fn from(plan: &ReconcilePlan) -> Self {
        Self {
            to_add: plan.to_add.len(),
            to_update: plan.to_update.len(),
            to_remove: plan.to_remove.len(),
            unchanged: plan.unchanged,
        }
    }
}

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub notes_dir: String,
    pub notes_dir_exists: bool,
    pub qdrant_url: String,
    pub collection_name: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub qdrant_connected: bool,
    pub collection_exists: bool,
    pub qdrant_points: u64,
    pub pending: Option<PendingWork>,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &QdrantStore, indexer: &Indexer) -> Result<StatusInfo> {
    info!("Getting status");

    let notes_dir = config.notes_dir();
    let notes_dir_exists = notes_dir.is_dir();

    let (qdrant_connected, collection) = match store.get_collection_info().await {
        Ok(info) => (true, info),
        Err(e) => {
            debug!("Qdrant connection error: {:?}", e);
            (false, None)
        }
    };
    let collection_exists = collection.is_some();

    // Without a collection every note on disk is still to be added
    let pending = match (notes_dir_exists, collection_exists, qdrant_connected) {
        (false, _, _) => None,
        (true, true, _) => Some(PendingWork::from(&indexer.pending().await?)),
        (true, false, true) => {
            let disk = scan_notes(&notes_dir, &config.notes.extensions)?;
            Some(PendingWork::from(&plan(&disk, &HashMap::new())))
        }
        (true, false, false) => None,
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        notes_dir: notes_dir.display().to_string(),
        notes_dir_exists,
        qdrant_url: config.qdrant_url.clone(),
        collection_name: config.collection_name.clone(),
        embedding_model: config.embedding.model.clone(),
        completion_model: config.completion.model.clone(),
        qdrant_connected,
        collection_exists,
        qdrant_points: collection.map(|c| c.points_count).unwrap_or(0),
        pending,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 schedi Status\n");
    println!("Configuration: {}", status.config_path);
    let notes_state = if status.notes_dir_exists {
        ""
    } else {
        " (missing - run 'schedi init')"
    };
    println!("Notes: {}{}", status.notes_dir, notes_state);
    println!("\nQdrant:");
    println!("  URL: {}", status.qdrant_url);
    println!("  Collection: {}", status.collection_name);

    let connection_status = if status.qdrant_connected {
        if status.collection_exists {
            "✓ Connected"
        } else {
            "⚠ Connected (collection not created - run 'schedi index' to create)"
        }
    } else {
        "✗ Not connected"
    };
    println!("  Status: {}", connection_status);
    println!("  Points: {}", status.qdrant_points);
    println!("\nEmbedding Model: {}", status.embedding_model);
    println!("Completion Model: {}", status.completion_model);

    if let Some(ref pending) = status.pending {
        println!("\nPending Index Work:");
        println!("  To add: {}", pending.to_add);
        println!("  To update: {}", pending.to_update);
        println!("  To remove: {}", pending.to_remove);
        println!("  Up to date: {}", pending.unchanged);
    }
}
