//! Fixed-window text chunking
//!
//! Notes are split into overlapping character windows. Windows start at
//! `0, stride, 2 * stride, ...` where `stride = chunk_size - overlap`, and
//! every window holds at most `chunk_size` characters. Positions count
//! Unicode scalar values so a window never cuts a UTF-8 sequence in half.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};

/// A chunk of a note file, ready to embed
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// The window text
    pub text: String,

    /// Source path of the originating note (its `source` key)
    pub source_path: String,

    /// Modification time of the note when it was read, seconds since epoch
    pub last_modified: f64,

    /// Chunk index within the note (0-based)
    pub chunk_index: usize,
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// Empty input yields no chunks. Non-empty input always yields at least one.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfiguration(
            "chunk size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(Error::InvalidConfiguration(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus the end of the string
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = offsets.len();
    offsets.push(text.len());

    let stride = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(char_len / stride + 1);
    let mut start = 0;

    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        chunks.push(text[offsets[start]..offsets[end]].to_string());
        start += stride;
    }

    Ok(chunks)
}

/// Chunk a whole note, attaching its source metadata to every window
pub fn chunk_document(
    text: &str,
    source_path: &str,
    last_modified: f64,
    config: &ChunkConfig,
) -> Result<Vec<DocumentChunk>> {
    let windows = split(text, config.size, config.overlap)?;

    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| DocumentChunk {
            text,
            source_path: source_path.to_string(),
            last_modified,
            chunk_index,
        })
        .collect())
}
