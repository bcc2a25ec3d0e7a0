//! Test doubles for the external capabilities

use crate::config::ChunkConfig;
use crate::embed::Embedder;
use crate::engine::{Engine, EngineSettings};
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::llm::{ChatMessage, Completer};
use crate::prompt::PromptTemplate;
use crate::store::MemoryStore;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FAKE_DIMENSION: usize = 32;

/// Deterministic bag-of-words embedder; texts sharing words land close together
pub struct FakeEmbedder {
    calls: AtomicUsize,
    fail_on: Option<String>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// Fail any batch containing a text with `needle`
    pub fn failing_on(needle: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(needle.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; FAKE_DIMENSION];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % FAKE_DIMENSION;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref needle) = self.fail_on {
            if texts.iter().any(|t| t.contains(needle.as_str())) {
                return Err(Error::Embedding("embedding backend unavailable".to_string()));
            }
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Completer that returns a fixed reply and records every request
pub struct RecordingCompleter {
    reply: String,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingCompleter {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    /// The user message of the most recent request
    pub fn last_user_message(&self) -> String {
        self.requests()
            .last()
            .and_then(|msgs| msgs.iter().find(|m| m.role == "user"))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "recording-completer"
    }
}

/// Engine over `dir` backed by the in-memory store and the doubles above
pub fn engine_in(dir: &Path, reply: &str) -> Engine {
    let store = Arc::new(MemoryStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new());
    let extensions = vec!["txt".to_string()];
    let indexer = Arc::new(Indexer::new(
        store.clone(),
        embedder.clone(),
        dir,
        extensions.clone(),
        ChunkConfig {
            size: 500,
            overlap: 100,
        },
    ));
    Engine::new(
        store,
        embedder,
        Arc::new(RecordingCompleter::replying(reply)),
        indexer,
        PromptTemplate::default(),
        EngineSettings {
            notes_dir: dir.to_path_buf(),
            extensions,
            write_extension: "txt".to_string(),
            top_k: 4,
            reindex_after_write: true,
        },
    )
}
