//! Interpreting the model's reply
//!
//! The prompt asks for a tagged JSON object:
//! `{"kind": "write", "date": "...", "content": "..."}` or
//! `{"kind": "answer", "text": "..."}`. Small local models do not always
//! comply, so a `>>> SAVE <date> | <content>` marker is accepted as well,
//! and anything else is treated as a plain answer.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// A request to append `content` to the note for `date`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub date: String,
    pub content: String,
}

/// What the model wants to happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Write(WriteCommand),
    Answer(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Structured {
    Write { date: String, content: String },
    Answer { text: String },
}

fn save_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)>>>\s*save\s*[|:,\-]?\s*(\d{4}-\d{1,2}-\d{1,2}|[^\s|,:]+)\s*[|:,\-]?\s*(.*)",
        )
        .unwrap()
    })
}

fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<think>.*?</think>").unwrap())
}

const DELIMITERS: &[char] = &['|', ':', ',', '-'];

/// Decide between a write command and a plain answer
pub fn parse_response(raw: &str) -> Reply {
    let text = think_block().replace_all(raw, "");

    if let Some(reply) = parse_structured(&text) {
        return reply;
    }

    if let Some(caps) = save_marker().captures(&text) {
        let date = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let content = caps.get(2).map_or("", |m| m.as_str());
        return Reply::Write(WriteCommand {
            date,
            content: clean_content(content),
        });
    }

    Reply::Answer(strip_code_fences(&text))
}

fn parse_structured(text: &str) -> Option<Reply> {
    let unfenced = strip_code_fences(text);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Structured>(&unfenced[start..=end]).ok()? {
        Structured::Write { date, content } => Some(Reply::Write(WriteCommand {
            date: date.trim().to_string(),
            content: clean_content(&content),
        })),
        Structured::Answer { text } => Some(Reply::Answer(text.trim().to_string())),
    }
}

fn clean_content(content: &str) -> String {
    let content = strip_code_fences(content);
    content
        .trim_start_matches(|c: char| DELIMITERS.contains(&c) || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Remove markdown code-fence lines (```` ``` ```` or ```` ```json ````) and trim
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
