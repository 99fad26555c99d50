//! Console Adapter - Human-Readable Run Log
//!
//! Implements the `ProgressSink` port as an append-only list of text
//! lines, mirrored to any `io::Write` (stderr in the binary, nothing in
//! tests). The report itself is rendered separately by `table`.

use std::io::Write;

use anyhow::{Context, Result};

use crate::ports::progress::{ProgressEvent, ProgressSink};

/// Append-only run log.
pub struct ConsoleLog<W: Write + Send> {
    lines: Vec<String>,
    out: W,
}

impl ConsoleLog<std::io::Sink> {
    /// Log that only records lines in memory.
    pub fn in_memory() -> Self {
        Self::new(std::io::sink())
    }
}

impl<W: Write + Send> ConsoleLog<W> {
    /// Log that records lines and writes each one to `out`.
    pub fn new(out: W) -> Self {
        Self {
            lines: Vec::new(),
            out,
        }
    }

    /// Every line written so far, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consume the log, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn push(&mut self, line: String) -> Result<()> {
        writeln!(self.out, "{line}").context("Failed to write progress line")?;
        self.lines.push(line);
        Ok(())
    }
}

/// Text lines for one event.
pub fn format_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::Started(summary) => vec![
            "Starting optimization...".to_string(),
            format!(
                "Model parameters: {} events, W=${}, LR={}, Iterations={}, Batch Size={}",
                summary.num_events,
                summary.wealth,
                summary.learning_rate,
                summary.iterations,
                summary.batch_size
            ),
        ],
        ProgressEvent::Iteration(p) => vec![format!(
            "Iter {}: Expected Log Return = {:.6}",
            p.iteration, p.expected_log_return
        )],
        ProgressEvent::Completed(_) => vec!["Optimization finished successfully.".to_string()],
        ProgressEvent::Diagnostic(diag) => {
            diag.to_string().lines().map(str::to_string).collect()
        }
    }
}

impl<W: Write + Send> ProgressSink for ConsoleLog<W> {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        for line in format_event(event) {
            self.push(line)?;
        }
        self.out.flush().context("Failed to flush progress output")?;
        Ok(())
    }
}
