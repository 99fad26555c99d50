//! Training Loop - Kelly Allocation Optimization Run
//!
//! Drives one optimization run end to end:
//! 1. Validates the market arrays (nothing is allocated on failure)
//! 2. Creates zeroed parameters and a fresh Adam state
//! 3. Per iteration: evaluate the Monte-Carlo loss, check it is finite,
//!    apply the Adam step
//! 4. Reports progress during warm-up, every 100th iteration and on the
//!    last one, yielding to the runtime at the same cadence
//! 5. Compiles the allocation report from the final parameters
//!
//! Divergence (non-finite loss) halts the run on the spot. There is no
//! retry and no learning-rate backoff.

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::adam::{AdamConfig, AdamOptimizer};
use crate::domain::allocation::AllocationParameters;
use crate::domain::error::{ComputeError, InputError};
use crate::domain::loss::StochasticLoss;
use crate::domain::market::MarketModel;
use crate::domain::report::AllocationReport;
use crate::ports::progress::{
  IterationProgress, ProgressEvent, ProgressSink, RunDiagnostic, RunSummary,
};

/// Every iteration below this index is reported.
pub const WARMUP_ITERATIONS: usize = 10;

/// After warm-up, every n-th iteration is reported.
pub const REPORT_INTERVAL: usize = 100;

/// Whether iteration `i` of `total` is reported (and yields).
pub fn is_report_iteration(i: usize, total: usize) -> bool {
  i < WARMUP_ITERATIONS || i % REPORT_INTERVAL == 0 || i + 1 == total
}

/// Inputs of one optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
  /// Market prices, one per event.
  pub prices: Vec<f64>,
  /// Assumed YES probabilities, one per event.
  pub true_probabilities: Vec<f64>,
  /// Initial wealth `W`.
  pub initial_wealth: f64,
  /// Number of optimizer steps.
  pub iterations: usize,
  /// Monte-Carlo samples per loss evaluation.
  pub batch_size: usize,
  /// Adam hyper-parameters (carries the learning rate).
  pub adam: AdamConfig,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Running,
  Converged,
  Diverged,
  Failed,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  /// Inputs failed validation; no run state was created.
  Rejected(InputError),
  /// Iteration budget exhausted with finite losses throughout.
  Converged {
    summary: RunSummary,
    report: AllocationReport,
    final_parameters: AllocationParameters,
    /// Estimate from the last iteration's batch (NaN if zero iterations).
    final_expected_log_return: f64,
  },
  /// Loss went non-finite at `iteration`.
  Diverged { summary: RunSummary, iteration: usize },
  /// A step failed with an unexpected error.
  Failed {
    summary: RunSummary,
    iteration: usize,
    error: String,
  },
}

impl RunOutcome {
  /// Terminal controller state matching this outcome.
  pub fn state(&self) -> RunState {
    match self {
      Self::Rejected(_) => RunState::Idle,
      Self::Converged { .. } => RunState::Converged,
      Self::Diverged { .. } => RunState::Diverged,
      Self::Failed { .. } => RunState::Failed,
    }
  }

  /// The report, present only for converged runs.
  pub fn report(&self) -> Option<&AllocationReport> {
    match self {
      Self::Converged { report, .. } => Some(report),
      _ => None,
    }
  }
}

/// Why the iteration loop stopped early.
enum Halt {
  Diverged(usize),
  Failed(usize, ComputeError),
}

/// Optimization run controller.
///
/// Owns the random source. One run at a time: `run` takes `&mut self`,
/// and all per-run state (parameters, optimizer moments, market
/// snapshot) lives inside the call and is dropped on every exit path.
pub struct TrainingLoop<R: Rng> {
  rng: R,
  seed: Option<u64>,
  state: RunState,
}

impl TrainingLoop<StdRng> {
  /// Controller backed by `StdRng`: seeded when `seed` is set,
  /// otherwise seeded from OS entropy.
  pub fn with_seed(seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(s) => StdRng::seed_from_u64(s),
      None => StdRng::from_entropy(),
    };
    Self {
      rng,
      seed,
      state: RunState::Idle,
    }
  }
}

impl<R: Rng + Send> TrainingLoop<R> {
  /// Controller over an arbitrary random source.
  pub fn new(rng: R) -> Self {
    Self {
      rng,
      seed: None,
      state: RunState::Idle,
    }
  }

  /// Current controller state.
  pub fn state(&self) -> RunState {
    self.state
  }

  /// Execute one run, streaming events to `sink`.
  ///
  /// Never returns an error: validation failures, divergence and
  /// unexpected faults are all folded into the returned [`RunOutcome`]
  /// and a diagnostic event.
  #[instrument(
    skip(self, request, sink),
    fields(events = request.prices.len(), iterations = request.iterations)
  )]
  pub async fn run<S: ProgressSink + ?Sized>(
    &mut self,
    request: &RunRequest,
    sink: &mut S,
  ) -> RunOutcome {
    let market = match MarketModel::new(
      request.prices.clone(),
      request.true_probabilities.clone(),
    ) {
      Ok(m) => m,
      Err(err) => {
        warn!(error = %err, "Run rejected: invalid market input");
        self.state = RunState::Idle;
        Self::emit_best_effort(
          sink,
          &ProgressEvent::Diagnostic(RunDiagnostic::InvalidInput(err.clone())),
        );
        return RunOutcome::Rejected(err);
      }
    };

    self.state = RunState::Running;
    let summary = RunSummary {
      run_id: Uuid::new_v4(),
      started_at: Utc::now(),
      num_events: market.num_events(),
      wealth: request.initial_wealth,
      learning_rate: request.adam.learning_rate,
      iterations: request.iterations,
      batch_size: request.batch_size,
      seed: self.seed,
    };

    info!(
      run_id = %summary.run_id,
      events = summary.num_events,
      wealth = summary.wealth,
      learning_rate = summary.learning_rate,
      batch_size = summary.batch_size,
      seed = ?summary.seed,
      "Optimization run started"
    );
    for (i, edge) in market.edges().enumerate() {
      debug!(run_id = %summary.run_id, event = i, edge, "Event edge (true prob - price)");
    }

    let started = Instant::now();
    let outcome = match sink.emit(&ProgressEvent::Started(summary.clone())) {
      Err(e) => Self::fail(sink, summary, 0, ComputeError::Sink(e)),
      Ok(()) => self.optimize(&market, request, summary, sink).await,
    };
    self.state = outcome.state();

    info!(
      state = ?self.state,
      elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
      "Optimization run finished"
    );
    outcome
  }

  /// Iterate, then compile the report. Parameters and optimizer state
  /// are locals of this call.
  async fn optimize<S: ProgressSink + ?Sized>(
    &mut self,
    market: &MarketModel,
    request: &RunRequest,
    summary: RunSummary,
    sink: &mut S,
  ) -> RunOutcome {
    let n = market.num_events();
    let mut params = AllocationParameters::zeros(n);
    let mut optimizer = AdamOptimizer::new(request.adam, n);
    let loss = StochasticLoss::new(market, request.initial_wealth, request.batch_size);
    debug!(
      run_id = %summary.run_id,
      batch_size = loss.batch_size(),
      learning_rate = optimizer.config().learning_rate,
      beta1 = optimizer.config().beta1,
      beta2 = optimizer.config().beta2,
      "Optimizer initialized"
    );

    let mut last_expected = f64::NAN;
    match self
      .iterate(&loss, &mut params, &mut optimizer, request.iterations, sink, &mut last_expected)
      .await
    {
      Ok(()) => {}
      Err(Halt::Diverged(iteration)) => {
        warn!(
          run_id = %summary.run_id,
          iteration,
          learning_rate = request.adam.learning_rate,
          "Loss is not finite, stopping optimization"
        );
        Self::emit_best_effort(
          sink,
          &ProgressEvent::Diagnostic(RunDiagnostic::Diverged { iteration }),
        );
        return RunOutcome::Diverged { summary, iteration };
      }
      Err(Halt::Failed(iteration, err)) => {
        return Self::fail(sink, summary, iteration, err);
      }
    }

    let report = match AllocationReport::compile(&params, market, request.initial_wealth) {
      Ok(r) => r,
      Err(err) => return Self::fail(sink, summary, request.iterations, err),
    };

    info!(
      run_id = %summary.run_id,
      f_yes = report.f_yes,
      f_no = report.f_no,
      net_capital = report.net_capital_deployed,
      cash_from_cancel = report.cash_from_cancel,
      active_positions = report.active_positions(),
      expected_log_return = last_expected,
      "Optimization finished successfully"
    );

    if let Err(e) = sink.emit(&ProgressEvent::Completed(Box::new(report.clone()))) {
      return Self::fail(sink, summary, request.iterations, ComputeError::Sink(e));
    }

    RunOutcome::Converged {
      summary,
      report,
      final_parameters: params,
      final_expected_log_return: last_expected,
    }
  }

  /// The iteration loop proper.
  async fn iterate<S: ProgressSink + ?Sized>(
    &mut self,
    loss: &StochasticLoss<'_>,
    params: &mut AllocationParameters,
    optimizer: &mut AdamOptimizer,
    iterations: usize,
    sink: &mut S,
    last_expected: &mut f64,
  ) -> Result<(), Halt> {
    for i in 0..iterations {
      let eval = loss
        .evaluate(params, &mut self.rng)
        .map_err(|e| Halt::Failed(i, e))?;

      if !eval.loss.is_finite() {
        return Err(Halt::Diverged(i));
      }

      optimizer
        .step(params, &eval.gradients)
        .map_err(|e| Halt::Failed(i, e))?;

      *last_expected = eval.expected_log_return();

      if is_report_iteration(i, iterations) {
        debug!(
          iteration = i,
          expected_log_return = *last_expected,
          grad_norm = eval.gradients.norm(),
          params_finite = params.is_finite(),
          "Iteration"
        );
        sink
          .emit(&ProgressEvent::Iteration(IterationProgress {
            iteration: i,
            expected_log_return: *last_expected,
          }))
          .map_err(|e| Halt::Failed(i, ComputeError::Sink(e)))?;
        tokio::task::yield_now().await;
      }
    }
    Ok(())
  }

  fn fail<S: ProgressSink + ?Sized>(
    sink: &mut S,
    summary: RunSummary,
    iteration: usize,
    err: ComputeError,
  ) -> RunOutcome {
    error!(run_id = %summary.run_id, iteration, error = %err, "Optimization step failed");
    let message = err.to_string();
    Self::emit_best_effort(
      sink,
      &ProgressEvent::Diagnostic(RunDiagnostic::Failed {
        iteration,
        message: message.clone(),
      }),
    );
    RunOutcome::Failed {
      summary,
      iteration,
      error: message,
    }
  }

  /// Terminal diagnostics are delivered if the sink still works.
  fn emit_best_effort<S: ProgressSink + ?Sized>(sink: &mut S, event: &ProgressEvent) {
    if let Err(e) = sink.emit(event) {
      warn!(error = %e, "Progress sink rejected terminal diagnostic");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(prices: Vec<f64>, probs: Vec<f64>) -> RunRequest {
    RunRequest {
      prices,
      true_probabilities: probs,
      initial_wealth: 100.0,
      iterations: 25,
      batch_size: 64,
      adam: AdamConfig::with_learning_rate(0.05),
    }
  }

  #[test]
  fn test_report_cadence() {
    let reported: Vec<usize> = (0..350).filter(|&i| is_report_iteration(i, 350)).collect();
    let mut expected: Vec<usize> = (0..10).collect();
    expected.extend([100, 200, 300, 349]);
    assert_eq!(reported, expected);
  }

  #[tokio::test]
  async fn test_rejected_run_stays_idle() {
    let mut controller = TrainingLoop::with_seed(Some(1));
    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = controller
      .run(&request(vec![0.5, 0.5], vec![0.5]), &mut events)
      .await;

    assert!(matches!(outcome, RunOutcome::Rejected(InputError::LengthMismatch { .. })));
    assert_eq!(controller.state(), RunState::Idle);
    assert_eq!(events.len(), 1);
    assert!(matches!(
      events[0],
      ProgressEvent::Diagnostic(RunDiagnostic::InvalidInput(_))
    ));
  }

  #[tokio::test]
  async fn test_converged_run_emits_started_progress_completed() {
    let mut controller = TrainingLoop::with_seed(Some(11));
    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = controller
      .run(&request(vec![0.3], vec![0.6]), &mut events)
      .await;

    assert_eq!(controller.state(), RunState::Converged);
    assert!(outcome.report().is_some());
    assert!(matches!(events.first(), Some(ProgressEvent::Started(_))));
    assert!(matches!(events.last(), Some(ProgressEvent::Completed(_))));
    match &outcome {
      RunOutcome::Converged { final_parameters, .. } => assert!(final_parameters.is_finite()),
      other => panic!("expected convergence, got {other:?}"),
    }
    let iterations: Vec<usize> = events
      .iter()
      .filter_map(|e| match e {
        ProgressEvent::Iteration(p) => Some(p.iteration),
        _ => None,
      })
      .collect();
    let mut expected: Vec<usize> = (0..10).collect();
    expected.push(24);
    assert_eq!(iterations, expected);
  }

  #[tokio::test]
  async fn test_zero_batch_diverges_at_first_iteration() {
    let mut controller = TrainingLoop::with_seed(Some(2));
    let mut req = request(vec![0.5], vec![0.5]);
    req.batch_size = 0;
    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = controller.run(&req, &mut events).await;

    assert!(matches!(outcome, RunOutcome::Diverged { iteration: 0, .. }));
    assert_eq!(controller.state(), RunState::Diverged);
    assert!(outcome.report().is_none());
  }

  #[test]
  fn test_same_seed_reproduces_trajectory() {
    let req = request(vec![0.4, 0.55], vec![0.5, 0.5]);
    let mut a = TrainingLoop::with_seed(Some(99));
    let mut b = TrainingLoop::with_seed(Some(99));
    let out_a = tokio_test::block_on(a.run(&req, &mut Vec::<ProgressEvent>::new()));
    let out_b = tokio_test::block_on(b.run(&req, &mut Vec::<ProgressEvent>::new()));
    assert_eq!(out_a.report(), out_b.report());
  }
}
