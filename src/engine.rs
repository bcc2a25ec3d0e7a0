//! Query orchestration
//!
//! One `ask` runs: resolve the date range, narrow to the notes in that
//! range, embed the question, search, build the grounding context, ask the
//! model, then either answer or save the entry the model asked for.
//!
//! A range with no notes does not stop the pipeline. The search runs
//! unfiltered and the model is told the period is empty, so it can still
//! explain that or save a new entry for a future date.

use crate::config::Config;
use crate::dates::{resolve_range, DateRange, TodayContext};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::llm::{ChatMessage, Completer};
use crate::notes::{scan_notes, sources_in_range};
use crate::prompt::PromptTemplate;
use crate::response::{parse_response, Reply};
use crate::store::{IndexStore, QueryHit, SourceFilter};
use crate::writer::ScheduleWriter;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context block used when the search returns nothing
pub const NO_NOTES_CONTEXT: &str = "(no related notes found)";

/// Result of one question
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AskOutcome {
    Answer {
        text: String,
    },
    Saved {
        date: String,
        content: String,
        path: PathBuf,
    },
    SaveFailed {
        date: String,
        error: String,
    },
}

impl AskOutcome {
    /// The string shown to the user
    pub fn into_response(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskOutcome::Answer { text } => write!(f, "{}", text),
            AskOutcome::Saved { date, content, .. } => {
                write!(f, "Saved schedule for {}: {}", date, content)
            }
            AskOutcome::SaveFailed { error, .. } => write!(f, "Failed to save schedule: {}", error),
        }
    }
}

/// Knobs for the orchestrator that do not come from the collaborators
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub notes_dir: PathBuf,
    pub extensions: Vec<String>,
    pub write_extension: String,
    pub top_k: usize,
    pub reindex_after_write: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            notes_dir: config.notes_dir(),
            extensions: config.notes.extensions.clone(),
            write_extension: config.notes.write_extension.clone(),
            top_k: config.query.top_k,
            reindex_after_write: config.index.reindex_after_write,
        }
    }
}

pub struct Engine {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    indexer: Arc<Indexer>,
    writer: ScheduleWriter,
    prompt: PromptTemplate,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        indexer: Arc<Indexer>,
        prompt: PromptTemplate,
        settings: EngineSettings,
    ) -> Self {
        let writer = ScheduleWriter::new(&settings.notes_dir, &settings.write_extension);
        Self {
            store,
            embedder,
            completer,
            indexer,
            writer,
            prompt,
            settings,
        }
    }

    /// Wire an engine and its indexer from configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Result<Self> {
        let indexer = Arc::new(Indexer::from_config(
            config,
            Arc::clone(&store),
            Arc::clone(&embedder),
        ));
        let prompt = PromptTemplate::load(&config.prompt_template_path())?;
        Ok(Self::new(
            store,
            embedder,
            completer,
            indexer,
            prompt,
            EngineSettings::from_config(config),
        ))
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Answer `message` relative to the local date
    pub async fn ask(&self, message: &str) -> Result<AskOutcome> {
        self.ask_on(message, chrono::Local::now().date_naive()).await
    }

    /// Answer `message` as if today were `today`
    pub async fn ask_on(&self, message: &str, today: NaiveDate) -> Result<AskOutcome> {
        let query = message.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("message must not be empty".to_string()));
        }

        let range = resolve_range(query, today);
        let candidates = match range.bounds() {
            Some((start, end)) => {
                let notes = scan_notes(&self.settings.notes_dir, &self.settings.extensions)?;
                sources_in_range(&notes, start, end)
            }
            None => Vec::new(),
        };
        debug!(range = %range, candidates = candidates.len(), "Resolved query dates");

        let filter = (!candidates.is_empty()).then(|| SourceFilter::new(candidates.clone()));

        let query_vector = self
            .embedder
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for query".to_string()))?;

        let mut hits = self
            .store
            .query(query_vector, self.settings.top_k, filter.as_ref())
            .await?;
        // Empty notes are stored as rows with no text
        hits.retain(|hit| !hit.document.trim().is_empty());
        debug!("Retrieved {} chunks", hits.len());

        let messages = vec![
            ChatMessage::system(self.prompt.render(&TodayContext::new(today))),
            ChatMessage::user(build_user_message(
                query,
                &range,
                candidates.is_empty(),
                &build_context(&hits),
            )),
        ];

        let raw = self.completer.complete(&messages).await?;

        match parse_response(&raw) {
            Reply::Answer(text) => Ok(AskOutcome::Answer { text }),
            Reply::Write(cmd) => Ok(self.save(&cmd.date, &cmd.content).await),
        }
    }

    /// Append an entry, then refresh the index so it is retrievable right away.
    ///
    /// Failures are reported in the outcome, not as errors.
    pub async fn save(&self, date: &str, content: &str) -> AskOutcome {
        match self.writer.write(date, content).await {
            Ok(path) => {
                info!("Saved schedule entry for {}", date);
                if self.settings.reindex_after_write {
                    if let Err(e) = self.indexer.run().await {
                        warn!("Reindex after save failed: {}", e);
                    }
                }
                AskOutcome::Saved {
                    date: date.trim().to_string(),
                    content: content.trim().to_string(),
                    path,
                }
            }
            Err(e) => {
                warn!("Saving schedule entry failed: {}", e);
                AskOutcome::SaveFailed {
                    date: date.trim().to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// `[i] (source: <file name>)` blocks, numbered from 1
pub fn build_context(hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return NO_NOTES_CONTEXT.to_string();
    }

    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let name = Path::new(&hit.metadata.source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| hit.metadata.source.clone());
        context.push_str(&format!("[{}] (source: {})\n{}\n\n", i + 1, name, hit.document));
    }
    context
}

fn build_user_message(query: &str, range: &DateRange, no_candidates: bool, context: &str) -> String {
    let mut message = String::new();

    if range.is_bounded() {
        message.push_str(&format!("Resolved date range: {}\n", range));
        if no_candidates {
            message.push_str("There are no notes for this period.\n");
        }
        message.push('\n');
    }

    message.push_str("Related notes:\n");
    message.push_str(context.trim_end());
    message.push_str("\n\nQuestion: ");
    message.push_str(query);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkConfig;
    use crate::store::{MemoryStore, RowMetadata};
    use crate::testing::{FakeEmbedder, RecordingCompleter};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        dir: PathBuf,
        store: Arc<MemoryStore>,
        completer: Arc<RecordingCompleter>,
        engine: Engine,
    }

    // Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    async fn fixture(notes: &[(&str, &str)], reply: &str) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, text) in notes {
            std::fs::write(dir.join(name), text).unwrap();
        }

        let store = Arc::new(MemoryStore::new());
        let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new());
        let completer = Arc::new(RecordingCompleter::replying(reply));
        let extensions = vec!["txt".to_string(), "md".to_string()];

        let indexer = Arc::new(Indexer::new(
            store.clone(),
            embedder.clone(),
            &dir,
            extensions.clone(),
            ChunkConfig {
                size: 500,
                overlap: 100,
            },
        ));
        indexer.run().await.unwrap();

        let engine = Engine::new(
            store.clone(),
            embedder,
            completer.clone(),
            indexer,
            PromptTemplate::new("Today {{TODAY}} {{WEEKDAY}}, Friday {{FRIDAY_DATE}}"),
            EngineSettings {
                notes_dir: dir.clone(),
                extensions,
                write_extension: "txt".to_string(),
                top_k: 4,
                reindex_after_write: true,
            },
        );

        Fixture {
            _tmp: tmp,
            dir,
            store,
            completer,
            engine,
        }
    }

    const ANSWER: &str = r#"{"kind": "answer", "text": "You have a dentist visit."}"#;

    #[tokio::test]
    async fn test_range_filters_to_dated_notes() {
        let fx = fixture(
            &[
                ("2024-06-11.txt", "- dentist appointment at 10"),
                ("2024-06-18.txt", "- dentist appointment at 3"),
            ],
            ANSWER,
        )
        .await;

        let outcome = fx.engine.ask_on("dentist next week", today()).await.unwrap();
        assert_eq!(outcome.to_string(), "You have a dentist visit.");

        let user = fx.completer.last_user_message();
        assert!(user.contains("Resolved date range: 2024-06-17 ~ 2024-06-23"));
        assert!(user.contains("[1] (source: 2024-06-18.txt)\n- dentist appointment at 3"));
        assert!(!user.contains("2024-06-11.txt"));
        assert!(user.ends_with("Question: dentist next week"));
    }

    #[tokio::test]
    async fn test_no_range_searches_everything() {
        let fx = fixture(
            &[
                ("2024-06-11.txt", "- dentist appointment"),
                ("2024-06-18.txt", "- dentist checkup"),
            ],
            ANSWER,
        )
        .await;

        fx.engine.ask_on("when is the dentist", today()).await.unwrap();
        let user = fx.completer.last_user_message();
        assert!(!user.contains("Resolved date range"));
        assert!(user.contains("[1] (source: "));
        assert!(user.contains("[2] (source: "));
    }

    #[tokio::test]
    async fn test_system_prompt_is_templated() {
        let fx = fixture(&[], ANSWER).await;
        fx.engine.ask_on("hello", today()).await.unwrap();

        let request = &fx.completer.requests()[0];
        assert_eq!(request[0].role, "system");
        assert_eq!(request[0].content, "Today 2024-06-12 Wednesday, Friday 2024-06-14");
    }

    #[tokio::test]
    async fn test_empty_period_falls_back_to_unfiltered_search() {
        let fx = fixture(&[("2024-06-11.txt", "- dentist appointment")], ANSWER).await;

        let first = fx.engine.ask_on("dentist next month", today()).await.unwrap();
        let first_msg = fx.completer.last_user_message();
        let second = fx.engine.ask_on("dentist next month", today()).await.unwrap();
        let second_msg = fx.completer.last_user_message();

        assert_eq!(first, second);
        assert_eq!(first_msg, second_msg);
        assert!(first_msg.contains("Resolved date range: 2024-07-01 ~ 2024-07-31"));
        assert!(first_msg.contains("There are no notes for this period."));
        assert!(first_msg.contains("(source: 2024-06-11.txt)"));
    }

    #[tokio::test]
    async fn test_no_hits_still_asks_the_model() {
        let fx = fixture(&[], ANSWER).await;

        let outcome = fx.engine.ask_on("anything planned?", today()).await.unwrap();
        assert!(matches!(outcome, AskOutcome::Answer { .. }));
        assert_eq!(fx.completer.requests().len(), 1);
        assert!(fx.completer.last_user_message().contains(NO_NOTES_CONTEXT));
    }

    #[tokio::test]
    async fn test_write_reply_saves_and_reindexes() {
        let fx = fixture(
            &[],
            r#"{"kind": "write", "date": "2024-06-14", "content": "dentist at 3pm"}"#,
        )
        .await;

        let outcome = fx
            .engine
            .ask_on("add dentist at 3pm on friday", today())
            .await
            .unwrap();

        let path = fx.dir.join("2024-06-14.txt");
        assert_eq!(
            outcome,
            AskOutcome::Saved {
                date: "2024-06-14".to_string(),
                content: "dentist at 3pm".to_string(),
                path: path.clone(),
            }
        );
        assert_eq!(
            outcome.into_response(),
            "Saved schedule for 2024-06-14: dentist at 3pm"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "- dentist at 3pm");

        let rows = fx.store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata.source, path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_marker_with_bad_date_reports_failure() {
        let fx = fixture(&[], ">>> SAVE 2024-13-45 | nonsense").await;

        let outcome = fx.engine.ask_on("save nonsense", today()).await.unwrap();
        match &outcome {
            AskOutcome::SaveFailed { date, error } => {
                assert_eq!(date, "2024-13-45");
                assert!(error.contains("Invalid date"));
            }
            other => panic!("expected SaveFailed, got {other:?}"),
        }
        assert!(outcome.into_response().starts_with("Failed to save schedule: "));
        assert_eq!(std::fs::read_dir(&fx.dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let fx = fixture(&[], ANSWER).await;
        let err = fx.engine.ask_on("   ", today()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(fx.completer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_saved_entry_is_retrievable() {
        let fx = fixture(&[("2024-06-11.txt", "- standup")], ANSWER).await;

        let saved = fx.engine.save("2024-06-14", "piano lesson").await;
        assert!(matches!(saved, AskOutcome::Saved { .. }));

        fx.engine.ask_on("piano lesson this friday 2024-06-14", today()).await.unwrap();
        let user = fx.completer.last_user_message();
        assert!(user.contains("[1] (source: 2024-06-14.txt)\n- piano lesson"));
    }

    #[tokio::test]
    async fn test_empty_note_rows_stay_out_of_context() {
        let fx = fixture(
            &[("2024-06-14.txt", ""), ("2024-06-11.txt", "- dentist appointment")],
            ANSWER,
        )
        .await;
        assert_eq!(fx.store.rows().await.len(), 2);

        fx.engine.ask_on("what is on 2024-06-14", today()).await.unwrap();
        let user = fx.completer.last_user_message();
        assert!(user.contains("Resolved date range: 2024-06-14"));
        assert!(!user.contains("There are no notes for this period."));
        assert!(user.contains(NO_NOTES_CONTEXT));
    }

    #[test]
    fn test_context_uses_basenames() {
        let hits = vec![QueryHit {
            id: "doc_1_0_0".to_string(),
            document: "- gym".to_string(),
            metadata: RowMetadata {
                source: "/home/me/docs/2024-06-10.txt".to_string(),
                last_modified: 1.0,
            },
            score: 0.9,
        }];
        assert_eq!(build_context(&hits), "[1] (source: 2024-06-10.txt)\n- gym\n\n");
        assert_eq!(build_context(&[]), NO_NOTES_CONTEXT);
    }
}
