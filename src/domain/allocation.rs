//! Softmax allocation parameterization.
//!
//! Four unconstrained parameter groups are mapped onto two simplices:
//! - `softmax([theta_yes, theta_no])` splits wealth between the YES and NO sides
//! - `softmax(phi_yes)` / `softmax(phi_no)` spread each side across events
//!
//! Every finite parameter vector therefore describes a feasible allocation
//! (non-negative, spending at most `W`), so plain gradient steps never need
//! a projection.

use serde::{Deserialize, Serialize};

use super::error::ComputeError;
use super::market::MarketModel;

/// Max-shifted softmax.
///
/// Non-finite logits are not repaired: `+inf` or NaN yields NaN weights.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Reverse pass through softmax.
///
/// Given the forward output `s` and the upstream gradient `g = dL/ds`,
/// returns `dL/dx_j = s_j * (g_j - sum_k s_k g_k)`.
pub fn softmax_backward(probs: &[f64], upstream: &[f64]) -> Vec<f64> {
    let dot: f64 = probs.iter().zip(upstream).map(|(s, g)| s * g).sum();
    probs
        .iter()
        .zip(upstream)
        .map(|(s, g)| s * (g - dot))
        .collect()
}

/// The learnable, unconstrained variables of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationParameters {
    /// Logit of the YES side in the YES/NO capital split.
    pub theta_yes: f64,
    /// Logit of the NO side in the YES/NO capital split.
    pub theta_no: f64,
    /// Per-event logits within the YES side.
    pub phi_yes: Vec<f64>,
    /// Per-event logits within the NO side.
    pub phi_no: Vec<f64>,
}

impl AllocationParameters {
    /// All-zero start: even YES/NO split, uniform spread across events.
    pub fn zeros(num_events: usize) -> Self {
        Self {
            theta_yes: 0.0,
            theta_no: 0.0,
            phi_yes: vec![0.0; num_events],
            phi_no: vec![0.0; num_events],
        }
    }

    /// Number of events these parameters cover.
    pub fn num_events(&self) -> usize {
        self.phi_yes.len()
    }

    /// Check that both per-event vectors match the market.
    ///
    /// # Errors
    /// Returns [`ComputeError::DimensionMismatch`] naming the offending group.
    pub fn check_dimensions(&self, num_events: usize) -> Result<(), ComputeError> {
        for (what, found) in [("phi_yes", self.phi_yes.len()), ("phi_no", self.phi_no.len())] {
            if found != num_events {
                return Err(ComputeError::DimensionMismatch {
                    what,
                    expected: num_events,
                    found,
                });
            }
        }
        Ok(())
    }

    /// True when every parameter is a finite number.
    pub fn is_finite(&self) -> bool {
        self.theta_yes.is_finite()
            && self.theta_no.is_finite()
            && self.phi_yes.iter().all(|x| x.is_finite())
            && self.phi_no.iter().all(|x| x.is_finite())
    }
}

/// Allocation implied by a parameter vector for a given market and wealth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Fraction of wealth on the YES side.
    pub f_yes: f64,
    /// Fraction of wealth on the NO side.
    pub f_no: f64,
    /// Per-event weights within the YES side (sums to 1).
    pub alpha_yes: Vec<f64>,
    /// Per-event weights within the NO side (sums to 1).
    pub alpha_no: Vec<f64>,
    /// Gross YES shares bought per event.
    pub n_yes: Vec<f64>,
    /// Gross NO shares bought per event.
    pub n_no: Vec<f64>,
}

impl Allocation {
    /// Map parameters onto share counts.
    ///
    /// `n_yes[i] = alpha_yes[i] * f_yes * W / priceAdj[i]`
    /// `n_no[i]  = alpha_no[i]  * f_no  * W / (1 - priceAdj[i])`
    ///
    /// # Errors
    /// Returns [`ComputeError::DimensionMismatch`] if the parameters were
    /// built for a different number of events.
    pub fn from_parameters(
        params: &AllocationParameters,
        market: &MarketModel,
        wealth: f64,
    ) -> Result<Self, ComputeError> {
        params.check_dimensions(market.num_events())?;

        let split = softmax(&[params.theta_yes, params.theta_no]);
        let (f_yes, f_no) = (split[0], split[1]);
        let alpha_yes = softmax(&params.phi_yes);
        let alpha_no = softmax(&params.phi_no);

        let n_yes = alpha_yes
            .iter()
            .zip(market.adjusted_prices())
            .map(|(a, q)| a * f_yes * wealth / q)
            .collect();
        let n_no = alpha_no
            .iter()
            .zip(market.adjusted_prices())
            .map(|(a, q)| a * f_no * wealth / (1.0 - q))
            .collect();

        Ok(Self {
            f_yes,
            f_no,
            alpha_yes,
            alpha_no,
            n_yes,
            n_no,
        })
    }

    /// Gross directional exposure per event: `n_yes[i] - n_no[i]`.
    pub fn net_shares(&self) -> Vec<f64> {
        self.n_yes.iter().zip(&self.n_no).map(|(y, n)| y - n).collect()
    }
}
