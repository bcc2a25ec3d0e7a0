//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - An Ollama backend with output length/dimension checks

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::ollama::{OllamaClient, Service};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the output has the input's length and order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Embedder backed by Ollama's `/api/embed`
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OllamaClient::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            Service::Embedding,
        )?;
        Ok(Self::with_client(client, &config.model, config.dimension))
    }

    pub fn with_client(client: OllamaClient, model: &str, dimension: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn validate(&self, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
        if embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "Model '{}' returned {} embeddings for {} inputs",
                self.model,
                embeddings.len(),
                expected
            )));
        }
        if let Some(mismatch) = embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let embeddings = self.client.embed(&self.model, texts).await?;
        self.validate(expected, &embeddings)?;
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
