//! Chat completion
//!
//! The orchestrator only needs "messages in, text out"; the `Completer`
//! trait is that seam. `OllamaCompleter` talks to Ollama's `/api/chat`.

use crate::config::CompletionConfig;
use crate::error::Result;
use crate::ollama::{OllamaClient, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for completion providers
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce the assistant's reply to `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn model_name(&self) -> &str;
}

pub struct OllamaCompleter {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = OllamaClient::new(
            &config.url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            Service::Completion,
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client
            .chat(&self.model, messages, self.temperature)
            .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
