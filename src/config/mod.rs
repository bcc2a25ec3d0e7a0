//! Configuration management for schedi
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Relative paths (notes directory, prompt template) are resolved against
//! the directory holding the config file.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Notes directory configuration
    #[serde(default)]
    pub notes: NotesConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion model configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// System prompt configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Indexing behaviour
    #[serde(default)]
    pub index: IndexConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Directory holding the `<YYYY-MM-DD>.<ext>` note files
    #[serde(default = "default_notes_dir")]
    pub dir: PathBuf,

    /// Extensions (without dot) that count as notes
    #[serde(default = "default_note_extensions")]
    pub extensions: Vec<String>,

    /// Extension used when the assistant creates a note
    #[serde(default = "default_write_extension")]
    pub write_extension: String,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Overlap characters between chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Number of chunks handed to the model
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Ollama base URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Chat model name/identifier
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Ollama base URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Sampling temperature
    #[serde(default = "default_completion_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System prompt template with {{TODAY}}, {{WEEKDAY}}, {{TOMORROW_DATE}}, {{FRIDAY_DATE}}
    #[serde(default = "default_prompt_template")]
    pub template: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Reconcile again right after the assistant saves an entry
    #[serde(default = "default_reindex_after_write")]
    pub reindex_after_write: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for schedi data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            notes: NotesConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            prompt: PromptConfig::default(),
            index: IndexConfig::default(),
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            dir: default_notes_dir(),
            extensions: default_note_extensions(),
            write_extension: default_write_extension(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            url: default_ollama_url(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            url: default_ollama_url(),
            temperature: default_completion_temperature(),
            timeout_secs: default_completion_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_prompt_template(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            reindex_after_write: default_reindex_after_write(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
        }
    }
}

impl Config {
    /// Get the default base directory for schedi (~/.schedi)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".schedi")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::InvalidConfiguration(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        std::env::var(&self.qdrant_api_key_env).ok()
    }

    /// Absolute notes directory
    pub fn notes_dir(&self) -> PathBuf {
        self.resolve(&self.notes.dir)
    }

    /// Absolute prompt template path
    pub fn prompt_template_path(&self) -> PathBuf {
        self.resolve(&self.prompt.template)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk.size must be > 0".to_string(),
            ));
        }

        if self.chunk.overlap >= self.chunk.size {
            return Err(Error::InvalidConfiguration(
                "chunk.overlap must be < chunk.size".to_string(),
            ));
        }

        if self.query.top_k == 0 {
            return Err(Error::InvalidConfiguration(
                "query.top_k must be > 0".to_string(),
            ));
        }

        if self.collection_name.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "collection_name must not be empty".to_string(),
            ));
        }

        if self.embedding.model.trim().is_empty() || self.completion.model.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "embedding.model and completion.model must be set".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding.dimension must be > 0".to_string(),
            ));
        }

        if self.notes.extensions.is_empty() {
            return Err(Error::InvalidConfiguration(
                "notes.extensions must list at least one extension".to_string(),
            ));
        }

        let write_ext = self.notes.write_extension.to_lowercase();
        if !self
            .notes
            .extensions
            .iter()
            .any(|e| e.to_lowercase() == write_ext)
        {
            return Err(Error::InvalidConfiguration(format!(
                "notes.write_extension '{}' is not in notes.extensions, written notes would never be indexed",
                self.notes.write_extension
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection_name, "local_docs");
        assert_eq!(config.chunk.size, 500);
        assert_eq!(config.chunk.overlap, 100);
        assert_eq!(config.query.top_k, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths = PathsConfig {
            base_dir: tmp.path().to_path_buf(),
            config_file: tmp.path().join("config.toml"),
        };
        config.collection_name = "test_collection".to_string();
        config.query.top_k = 7;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.collection_name, "test_collection");
        assert_eq!(loaded.query.top_k, 7);
        assert_eq!(loaded.paths.base_dir, tmp.path());
    }

    #[test]
    fn test_omitted_path_fields_take_defaults() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[notes]\nextensions = [\"txt\"]\n\n[prompt]\n",
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.notes.dir, PathBuf::from("docs"));
        assert_eq!(config.prompt.template, PathBuf::from("prompts/system_prompt.txt"));
        assert_eq!(config.notes_dir(), tmp.path().join("docs"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Invalid: overlap >= size
        config.chunk.overlap = config.chunk.size;
        assert!(config.validate().is_err());

        config.chunk.overlap = 100;
        assert!(config.validate().is_ok());

        config.chunk.size = 0;
        assert!(config.validate().is_err());
        config.chunk.size = 500;

        config.query.top_k = 0;
        assert!(config.validate().is_err());
        config.query.top_k = 4;

        config.notes.write_extension = "docx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[notes]\ndir = \"my-notes\"\n\n[chunk]\nsize = 50\noverlap = 10\n",
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.notes_dir(), tmp.path().join("my-notes"));
        assert_eq!(
            config.prompt_template_path(),
            tmp.path().join("prompts/system_prompt.txt")
        );
        assert_eq!(config.chunk.size, 50);
    }

    #[test]
    fn test_load_rejects_bad_chunking() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[chunk]\nsize = 10\noverlap = 10\n").unwrap();

        match Config::load(&config_path) {
            Err(Error::InvalidConfiguration(msg)) => assert!(msg.contains("overlap")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
