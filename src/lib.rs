//! schedi - a local RAG assistant for a personal schedule
//!
//! This crate provides:
//! - Incremental indexing of dated note files into a vector store
//! - Date-aware retrieval (natural-language ranges like "next week" or "다음주")
//! - Answer synthesis through a local chat model, with write-back of new entries
//! - A CLI and a small HTTP server in front of the same engine

pub mod chunk;
pub mod commands;
pub mod config;
pub mod dates;
pub mod embed;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod notes;
pub mod ollama;
pub mod progress;
pub mod prompt;
pub mod response;
pub mod server;
pub mod store;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Error, Result};
