//! Default values for configuration

use std::path::PathBuf;

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "local_docs".to_string()
}

/// Default notes directory, relative to the config file
pub fn default_notes_dir() -> PathBuf {
    PathBuf::from("docs")
}

/// Note file extensions picked up by the indexer
pub fn default_note_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

/// Extension used for notes created by the schedule writer
pub fn default_write_extension() -> String {
    "txt".to_string()
}

/// Default chunk size in characters
pub fn default_chunk_size() -> usize {
    500
}

/// Default overlap in characters between consecutive chunks
pub fn default_chunk_overlap() -> usize {
    100
}

/// Default number of chunks retrieved per query
pub fn default_top_k() -> usize {
    4
}

/// Default Ollama URL, shared by embeddings and completions
pub fn default_ollama_url() -> String {
    std::env::var("SCHEDI_OLLAMA_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "embeddinggemma".to_string()
}

/// Output dimension of the default embedding model
pub fn default_embedding_dimension() -> usize {
    768
}

/// Embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default completion model
pub fn default_completion_model() -> String {
    "qwen3:1.7b".to_string()
}

/// Default sampling temperature
pub fn default_completion_temperature() -> f32 {
    0.3
}

/// Completion request timeout in seconds (local models can be slow)
pub fn default_completion_timeout() -> u64 {
    120
}

/// Retries after the first attempt for transient backend failures
pub fn default_max_retries() -> u32 {
    2
}

/// Default system prompt template, relative to the config file
pub fn default_prompt_template() -> PathBuf {
    PathBuf::from("prompts/system_prompt.txt")
}

/// Re-run reconciliation after a schedule entry is written
pub fn default_reindex_after_write() -> bool {
    true
}

/// Default HTTP bind address
pub fn default_server_bind() -> String {
    "127.0.0.1:8000".to_string()
}
