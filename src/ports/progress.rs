//! Progress Port - Run Event Stream Interface
//!
//! The training loop never prints. It emits structured events through
//! a `ProgressSink`; adapters turn them into a log pane, stdout lines,
//! JSON, or assertions in tests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::error::InputError;
use crate::domain::report::AllocationReport;

/// Parameters of a run, announced once when it starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
  /// Unique run identifier.
  pub run_id: Uuid,
  /// Wall-clock start time.
  pub started_at: DateTime<Utc>,
  /// Number of events in the market.
  pub num_events: usize,
  /// Initial wealth `W`.
  pub wealth: f64,
  /// Global Adam learning rate.
  pub learning_rate: f64,
  /// Configured iteration budget.
  pub iterations: usize,
  /// Monte-Carlo samples per loss evaluation.
  pub batch_size: usize,
  /// RNG seed, if the run is reproducible.
  pub seed: Option<u64>,
}

/// Loss estimate at a reported iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationProgress {
  /// Zero-based iteration index.
  pub iteration: usize,
  /// `-loss` of this iteration's batch.
  pub expected_log_return: f64,
}

/// Terminal problem reported to the user instead of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunDiagnostic {
  /// Inputs rejected; the run never started.
  InvalidInput(InputError),
  /// Loss became non-finite at `iteration`.
  Diverged { iteration: usize },
  /// Unexpected error at `iteration`.
  Failed { iteration: usize, message: String },
}

impl std::fmt::Display for RunDiagnostic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::InvalidInput(err) => write!(f, "{err}"),
      Self::Diverged { iteration } => {
        writeln!(f, "--- ERROR ---")?;
        writeln!(
          f,
          "Optimization failed at iteration {iteration}: Result is not a finite number (NaN)."
        )?;
        writeln!(
          f,
          "This is likely due to an overly large learning rate or unstable input values."
        )?;
        writeln!(
          f,
          "Try lowering the Learning Rate or simplifying the market inputs."
        )?;
        write!(f, "--- STOPPING OPTIMIZATION ---")
      }
      Self::Failed { message, .. } => {
        write!(f, "An unexpected error occurred: {message}")
      }
    }
  }
}

/// Event emitted by the training loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
  /// Inputs validated, optimization state created.
  Started(RunSummary),
  /// Periodic loss report.
  Iteration(IterationProgress),
  /// All iterations done; carries the compiled report.
  Completed(Box<AllocationReport>),
  /// Validation failure, divergence, or unexpected error.
  Diagnostic(RunDiagnostic),
}

/// Consumer of run events.
///
/// An `Err` from the sink aborts the run as a failure: a log that
/// cannot be written is not silently skipped.
pub trait ProgressSink: Send {
  /// Handle one event, in emission order.
  fn emit(&mut self, event: &ProgressEvent) -> anyhow::Result<()>;
}

/// Recording sink, mostly for tests and embedding.
impl ProgressSink for Vec<ProgressEvent> {
  fn emit(&mut self, event: &ProgressEvent) -> anyhow::Result<()> {
    self.push(event.clone());
    Ok(())
  }
}
