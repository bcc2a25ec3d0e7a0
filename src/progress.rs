//! Progress bars that log lines do not tear.
//!
//! All bars hang off one [`MultiProgress`] drawing to stderr, and the
//! tracing writer routes each log line through it so output lands above
//! the bars instead of through them.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI: OnceLock<MultiProgress> = OnceLock::new();

fn multi() -> &'static MultiProgress {
    MULTI.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

const INDEX_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} notes {msg}";

/// Bar for an index run over `len` notes
pub fn index_progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(INDEX_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    multi().add(ProgressBar::new(len).with_style(style))
}

/// `MakeWriter` for `tracing_subscriber::fmt` that prints through the bars
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriterFactory;

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}

/// Buffers one event and emits it a line at a time
#[derive(Default)]
pub struct LogWriter {
    pending: Vec<u8>,
}

impl LogWriter {
    fn emit(line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let _ = multi().println(text.trim_end_matches('\r'));
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            Self::emit(&line[..line.len() - 1]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            Self::emit(&line);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
