//! HTTP client for a local Ollama server
//!
//! Shared by the embedding and completion adapters. Every request has a
//! timeout; network errors, HTTP 429 and 5xx are retried with exponential
//! backoff, any other error status fails immediately.

use crate::error::{Error, Result};
use crate::llm::ChatMessage;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Which capability a client serves; selects the error variant on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Completion,
}

impl Service {
    fn error(self, message: String) -> Error {
        match self {
            Service::Embedding => Error::Embedding(message),
            Service::Completion => Error::Completion(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: Url,
    retries: u32,
    retry_delay: Duration,
    service: Service,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration, retries: u32, service: Service) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            retries,
            retry_delay: Duration::from_millis(500),
            service,
        })
    }

    /// Base delay before the first retry; doubles on each further attempt
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidConfiguration(format!("Invalid Ollama URL: {}", e)))
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = self.retry_delay * 2u32.saturating_pow((attempt - 1).min(5));
                debug!("Retrying Ollama request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            let req = request
                .try_clone()
                .ok_or_else(|| self.service.error("Failed to clone Ollama request".to_string()))?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            self.service
                                .error(format!("Invalid Ollama response: {}", e))
                        });
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = self
                        .service
                        .error(format!("Ollama API error {}: {}", status, body.trim()));

                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!("Transient Ollama failure ({}), will retry", status);
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    warn!("Ollama connection error: {}", e);
                    last_err = Some(self.service.error(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.base_url, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            self.service
                .error("Ollama request failed after retries".to_string())
        }))
    }

    /// `POST /api/embed`
    pub async fn embed(&self, model: &str, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let request = EmbedRequest { model, input };
        let parsed: EmbedResponse = self
            .send_with_retry(self.client.post(url).json(&request))
            .await?;
        Ok(parsed.embeddings)
    }

    /// `POST /api/chat`, non-streaming
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        let url = self.endpoint("/api/chat")?;
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };
        let parsed: ChatResponse = self
            .send_with_retry(self.client.post(url).json(&request))
            .await?;
        Ok(parsed.message.content)
    }
}
