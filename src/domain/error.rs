//! Domain error types.
//!
//! Two families: input validation failures, which are detected before any
//! optimization state exists, and computational failures raised mid-run.

use serde::Serialize;
use thiserror::Error;

/// Market input rejected before a run starts.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InputError {
    /// One or both input arrays were empty.
    #[error(
        "Error: Market Prices and True Probabilities must have the same number of comma-separated values."
    )]
    Empty { prices: usize, probabilities: usize },

    /// Arrays of different length.
    #[error(
        "Error: Market Prices and True Probabilities must have the same number of comma-separated values."
    )]
    LengthMismatch { prices: usize, probabilities: usize },
}

/// Failure raised while a training step is in flight.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// A parameter, gradient or moment buffer has the wrong length.
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// The progress sink refused an event.
    #[error("progress sink failed: {0}")]
    Sink(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISMATCH_MESSAGE: &str = "Error: Market Prices and True Probabilities must have the same number of comma-separated values.";

    #[test]
    fn test_input_error_message_matches_log_text() {
        let err = InputError::LengthMismatch {
            prices: 2,
            probabilities: 3,
        };
        assert_eq!(err.to_string(), MISMATCH_MESSAGE);
        let empty = InputError::Empty {
            prices: 0,
            probabilities: 1,
        };
        assert_eq!(empty.to_string(), err.to_string());
    }

    #[test]
    fn test_compute_error_display() {
        let err = ComputeError::DimensionMismatch {
            what: "phi_yes",
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch in phi_yes: expected 3, found 2"
        );
    }
}
