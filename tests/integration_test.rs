//! Integration Tests - Training Loop Against the Progress Port
//!
//! Tests the interaction between the training loop, the progress port
//! and the console adapter. Uses mockall for trait mocking and
//! tokio::test for async tests.

use anyhow::anyhow;
use mockall::mock;

use kelly_allocator::adapters::console::ConsoleLog;
use kelly_allocator::domain::adam::AdamConfig;
use kelly_allocator::ports::progress::{ProgressEvent, RunDiagnostic};
use kelly_allocator::usecases::training_loop::{
    RunOutcome, RunRequest, RunState, TrainingLoop,
};

// ---- Mock Definitions ----

mock! {
    pub Sink {}

    impl kelly_allocator::ports::progress::ProgressSink for Sink {
        fn emit(&mut self, event: &ProgressEvent) -> anyhow::Result<()>;
    }
}

// ---- Helpers ----

fn request(prices: Vec<f64>, probs: Vec<f64>, iterations: usize) -> RunRequest {
    RunRequest {
        prices,
        true_probabilities: probs,
        initial_wealth: 100.0,
        iterations,
        batch_size: 64,
        adam: AdamConfig::with_learning_rate(0.05),
    }
}

fn is_started(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::Started(_))
}

fn is_iteration(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::Iteration(_))
}

fn is_completed(e: &ProgressEvent) -> bool {
    matches!(e, ProgressEvent::Completed(_))
}

// ---- Tests ----

#[tokio::test]
async fn test_converged_run_event_counts() {
    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(is_started)
        .times(1)
        .returning(|_| Ok(()));
    // warm-up iterations 0..10 plus the last one
    sink.expect_emit()
        .withf(is_iteration)
        .times(11)
        .returning(|_| Ok(()));
    sink.expect_emit()
        .withf(is_completed)
        .times(1)
        .returning(|_| Ok(()));

    let mut controller = TrainingLoop::with_seed(Some(5));
    let outcome = controller
        .run(&request(vec![0.3, 0.7], vec![0.6, 0.4], 20), &mut sink)
        .await;

    assert_eq!(outcome.state(), RunState::Converged);
    assert_eq!(controller.state(), RunState::Converged);
}

#[tokio::test]
async fn test_rejected_input_emits_single_diagnostic() {
    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(|e| {
            matches!(
                e,
                ProgressEvent::Diagnostic(RunDiagnostic::InvalidInput(_))
            )
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut controller = TrainingLoop::with_seed(Some(5));
    let outcome = controller
        .run(&request(vec![], vec![], 20), &mut sink)
        .await;

    assert!(matches!(outcome, RunOutcome::Rejected(_)));
    assert_eq!(controller.state(), RunState::Idle);
}

#[tokio::test]
async fn test_sink_failure_mid_run_fails_the_run() {
    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(is_started)
        .times(1)
        .returning(|_| Ok(()));
    sink.expect_emit()
        .withf(is_iteration)
        .times(1)
        .returning(|_| Err(anyhow!("disk full")));
    sink.expect_emit()
        .withf(|e| matches!(e, ProgressEvent::Diagnostic(RunDiagnostic::Failed { .. })))
        .times(1)
        .returning(|_| Ok(()));

    let mut controller = TrainingLoop::with_seed(Some(5));
    let outcome = controller
        .run(&request(vec![0.5], vec![0.5], 20), &mut sink)
        .await;

    match outcome {
        RunOutcome::Failed {
            iteration, error, ..
        } => {
            assert_eq!(iteration, 0);
            assert!(error.contains("disk full"), "error was: {error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(controller.state(), RunState::Failed);
}

#[tokio::test]
async fn test_sink_failure_on_start_fails_before_iterating() {
    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(is_started)
        .times(1)
        .returning(|_| Err(anyhow!("closed")));
    sink.expect_emit()
        .withf(|e| matches!(e, ProgressEvent::Diagnostic(_)))
        .times(1)
        .returning(|_| Ok(()));

    let mut controller = TrainingLoop::with_seed(Some(5));
    let outcome = controller
        .run(&request(vec![0.5], vec![0.5], 20), &mut sink)
        .await;

    assert!(matches!(outcome, RunOutcome::Failed { iteration: 0, .. }));
}

#[tokio::test]
async fn test_console_log_records_full_run() {
    let mut log = ConsoleLog::in_memory();
    let mut controller = TrainingLoop::with_seed(Some(3));
    let outcome = controller
        .run(&request(vec![0.3], vec![0.6], 150), &mut log)
        .await;
    assert_eq!(outcome.state(), RunState::Converged);

    let lines = log.lines();
    assert_eq!(lines[0], "Starting optimization...");
    assert_eq!(
        lines[1],
        "Model parameters: 1 events, W=$100, LR=0.05, Iterations=150, Batch Size=64"
    );
    assert!(lines[2].starts_with("Iter 0: Expected Log Return = "));
    assert!(lines.iter().any(|l| l.starts_with("Iter 100: ")));
    assert!(lines.iter().any(|l| l.starts_with("Iter 149: ")));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Optimization finished successfully.")
    );
    // 10 warm-up lines, iteration 100, iteration 149
    let iter_lines = lines.iter().filter(|l| l.starts_with("Iter ")).count();
    assert_eq!(iter_lines, 12);
}

#[tokio::test]
async fn test_console_log_rejection_message() {
    let mut log = ConsoleLog::in_memory();
    let mut controller = TrainingLoop::with_seed(None);
    controller
        .run(&request(vec![0.3, 0.4], vec![0.6], 10), &mut log)
        .await;
    assert_eq!(
        log.lines(),
        [
            "Error: Market Prices and True Probabilities must have the same number of comma-separated values."
                .to_string()
        ]
    );
}
