//! Ask, chat and save commands

use crate::engine::{AskOutcome, Engine};
use crate::error::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Words that leave the chat loop
const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

/// Answer a single question
pub async fn cmd_ask(engine: &Engine, message: &str) -> Result<AskOutcome> {
    engine.ask(message).await
}

/// Append an entry directly, bypassing the model
pub async fn cmd_save(engine: &Engine, date: &str, content: &str) -> AskOutcome {
    engine.save(date, content).await
}

/// Interactive loop on stdin/stdout
pub async fn cmd_chat(engine: &Engine) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    chat_loop(engine, stdin, &mut std::io::stdout()).await
}

/// Read questions line by line from `input` until EOF or an exit word.
///
/// A failed question is reported and the loop keeps going.
pub async fn chat_loop<R, W>(engine: &Engine, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
            debug!("Leaving chat");
            break;
        }

        match engine.ask(line).await {
            Ok(outcome) => writeln!(out, "{}\n", outcome)?,
            Err(e) => {
                warn!("Question failed: {}", e);
                writeln!(out, "Error: {}\n", e)?;
            }
        }
    }

    Ok(())
}

/// Print an ask outcome to console
pub fn print_outcome(outcome: &AskOutcome) {
    match outcome {
        AskOutcome::Saved { path, .. } => {
            println!("✓ {}", outcome);
            println!("  File: {}", path.display());
        }
        AskOutcome::SaveFailed { .. } => println!("✗ {}", outcome),
        AskOutcome::Answer { .. } => println!("{}", outcome),
    }
}
