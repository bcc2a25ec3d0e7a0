//! Index command implementation

use crate::error::Result;
use crate::indexer::{IndexReport, Indexer};
use crate::progress::index_progress_bar;

/// Reconcile the notes directory with the store
pub async fn cmd_index(indexer: &Indexer, show_progress: bool) -> Result<IndexReport> {
    if !show_progress {
        return indexer.run().await;
    }

    let pb = index_progress_bar(0);
    let result = indexer.run_with_progress(Some(&pb)).await;
    pb.finish_and_clear();
    result
}

/// Print an index report to console
pub fn print_index_report(report: &IndexReport) {
    println!("\n📒 Index Results\n");
    println!("  Added: {}", report.added);
    println!("  Updated: {}", report.updated);
    println!("  Removed: {}", report.removed);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Chunks written: {}", report.chunks_written);

    if !report.failed.is_empty() {
        println!("\n⚠ Skipped {} files:", report.failed.len());
        for source in &report.failed {
            println!("  - {}", source);
        }
    }
}
