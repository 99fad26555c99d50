//! Monte-Carlo outcome batches.

use rand::Rng;

/// `batch_size x num_events` matrix of 0/1 outcomes, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSample {
    outcomes: Vec<f64>,
    batch_size: usize,
    num_events: usize,
}

impl BatchSample {
    /// Draw independent Bernoulli outcomes, one row per simulated world.
    ///
    /// Entry `(s, i)` is 1 when a uniform draw falls below
    /// `probabilities[i]`, so probabilities outside `[0, 1]` saturate.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, probabilities: &[f64], batch_size: usize) -> Self {
        let num_events = probabilities.len();
        let mut outcomes = Vec::with_capacity(batch_size * num_events);
        for _ in 0..batch_size {
            outcomes.extend(
                probabilities
                    .iter()
                    .map(|&p| if rng.r#gen::<f64>() < p { 1.0 } else { 0.0 }),
            );
        }
        Self {
            outcomes,
            batch_size,
            num_events,
        }
    }

    /// Build a batch from explicit rows.
    ///
    /// # Panics
    /// Panics if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let num_events = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|r| r.len() == num_events),
            "all outcome rows must have the same length"
        );
        Self {
            outcomes: rows.iter().flatten().copied().collect(),
            batch_size: rows.len(),
            num_events,
        }
    }

    /// Number of simulated worlds.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of events per world.
    pub fn num_events(&self) -> usize {
        self.num_events
    }

    /// Outcomes of one simulated world.
    pub fn row(&self, sample: usize) -> &[f64] {
        let start = sample * self.num_events;
        &self.outcomes[start..start + self.num_events]
    }

    /// Iterate over all simulated worlds.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; a zero-event batch has no rows to yield anyway
        self.outcomes.chunks_exact(self.num_events.max(1))
    }
}
