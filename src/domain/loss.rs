//! Negative expected log-growth of wealth, estimated by Monte Carlo.
//!
//! For a batch of simulated outcomes `y[s][i]`:
//!
//! ```text
//! G[s]     = sum_i (y[s][i] - price[i]) * (n_yes[i] - n_no[i])
//! ratio[s] = max(1 + G[s] / W, EPSILON)
//! loss     = -mean_s ln(ratio[s])
//! ```
//!
//! Minimizing this is maximizing the Kelly growth rate. The gradient with
//! respect to the four parameter groups is derived by hand, walking the
//! forward pass backwards: mean -> ln -> clip -> gain -> share counts ->
//! softmax.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::allocation::{Allocation, AllocationParameters, softmax_backward};
use super::error::ComputeError;
use super::market::{EPSILON, MarketModel};
use super::sampling::BatchSample;

/// Clip a wealth ratio to `[EPSILON, +inf)` before taking its log.
///
/// NaN is passed through so a broken parameter state stays visible.
pub fn clip_wealth_ratio(ratio: f64) -> f64 {
    if ratio < EPSILON { EPSILON } else { ratio }
}

/// `dL/dparam` for each of the four parameter groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationGradients {
    pub theta_yes: f64,
    pub theta_no: f64,
    pub phi_yes: Vec<f64>,
    pub phi_no: Vec<f64>,
}

impl AllocationGradients {
    /// Zero gradient for `num_events` events.
    pub fn zeros(num_events: usize) -> Self {
        Self {
            theta_yes: 0.0,
            theta_no: 0.0,
            phi_yes: vec![0.0; num_events],
            phi_no: vec![0.0; num_events],
        }
    }

    /// Euclidean norm over all groups.
    pub fn norm(&self) -> f64 {
        let sq = self.theta_yes.powi(2)
            + self.theta_no.powi(2)
            + self.phi_yes.iter().map(|g| g * g).sum::<f64>()
            + self.phi_no.iter().map(|g| g * g).sum::<f64>();
        sq.sqrt()
    }
}

/// Scalar loss and its gradient from one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct LossEvaluation {
    /// Negative mean log wealth ratio.
    pub loss: f64,
    /// Gradient of `loss` with respect to the parameters.
    pub gradients: AllocationGradients,
}

impl LossEvaluation {
    /// Estimated expected log return, i.e. `-loss`.
    pub fn expected_log_return(&self) -> f64 {
        -self.loss
    }
}

/// Monte-Carlo estimator of the Kelly objective for one market.
#[derive(Debug, Clone, Copy)]
pub struct StochasticLoss<'a> {
    market: &'a MarketModel,
    wealth: f64,
    batch_size: usize,
}

impl<'a> StochasticLoss<'a> {
    pub fn new(market: &'a MarketModel, wealth: f64, batch_size: usize) -> Self {
        Self {
            market,
            wealth,
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Draw a fresh batch from `rng` and evaluate on it.
    ///
    /// # Errors
    /// Propagates [`ComputeError::DimensionMismatch`] from the
    /// parameterization.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        params: &AllocationParameters,
        rng: &mut R,
    ) -> Result<LossEvaluation, ComputeError> {
        let batch = BatchSample::draw(rng, self.market.true_probabilities(), self.batch_size);
        self.evaluate_on(params, &batch)
    }

    /// Evaluate loss and gradient on a given batch.
    ///
    /// An empty batch yields a NaN loss.
    ///
    /// # Errors
    /// Returns [`ComputeError::DimensionMismatch`] if the batch or the
    /// parameters do not match the market.
    pub fn evaluate_on(
        &self,
        params: &AllocationParameters,
        batch: &BatchSample,
    ) -> Result<LossEvaluation, ComputeError> {
        let n = self.market.num_events();
        if batch.num_events() != n {
            return Err(ComputeError::DimensionMismatch {
                what: "outcome batch",
                expected: n,
                found: batch.num_events(),
            });
        }

        let w = self.wealth;
        let alloc = Allocation::from_parameters(params, self.market, w)?;
        let exposure = alloc.net_shares();
        let prices = self.market.prices();
        let b = batch.batch_size() as f64;

        let mut total_log = 0.0;
        // dL/d(n_yes[i] - n_no[i])
        let mut d_exposure = vec![0.0; n];

        for row in batch.rows() {
            let gain: f64 = row
                .iter()
                .zip(prices)
                .zip(&exposure)
                .map(|((y, p), d)| (y - p) * d)
                .sum();
            let ratio = 1.0 + gain / w;
            let clipped = clip_wealth_ratio(ratio);
            total_log += clipped.ln();

            // clip passes gradient only on its identity branch
            if ratio >= EPSILON {
                let d_gain = -1.0 / (b * clipped * w);
                for ((acc, y), p) in d_exposure.iter_mut().zip(row).zip(prices) {
                    *acc += d_gain * (y - p);
                }
            }
        }

        let loss = -total_log / b;
        let gradients = Self::backpropagate(&alloc, self.market.adjusted_prices(), w, &d_exposure);

        Ok(LossEvaluation { loss, gradients })
    }

    /// Push `dL/d(exposure)` back through share counts and both softmaxes.
    fn backpropagate(
        alloc: &Allocation,
        adjusted_prices: &[f64],
        wealth: f64,
        d_exposure: &[f64],
    ) -> AllocationGradients {
        let n = d_exposure.len();
        let mut d_alpha_yes = Vec::with_capacity(n);
        let mut d_alpha_no = Vec::with_capacity(n);
        let mut d_f_yes = 0.0;
        let mut d_f_no = 0.0;

        for i in 0..n {
            let q = adjusted_prices[i];
            let yes_scale = wealth / q;
            let no_scale = wealth / (1.0 - q);
            // n_yes enters the exposure with +1, n_no with -1
            let d_n_yes = d_exposure[i];
            let d_n_no = -d_exposure[i];

            d_alpha_yes.push(d_n_yes * alloc.f_yes * yes_scale);
            d_alpha_no.push(d_n_no * alloc.f_no * no_scale);
            d_f_yes += d_n_yes * alloc.alpha_yes[i] * yes_scale;
            d_f_no += d_n_no * alloc.alpha_no[i] * no_scale;
        }

        let d_theta = softmax_backward(&[alloc.f_yes, alloc.f_no], &[d_f_yes, d_f_no]);

        AllocationGradients {
            theta_yes: d_theta[0],
            theta_no: d_theta[1],
            phi_yes: softmax_backward(&alloc.alpha_yes, &d_alpha_yes),
            phi_no: softmax_backward(&alloc.alpha_no, &d_alpha_no),
        }
    }
}
