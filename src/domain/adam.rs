//! Adam optimizer over the four allocation parameter groups.
//!
//! Standard bias-corrected update, applied element-wise with one global
//! learning rate:
//!
//! ```text
//! m <- b1 * m + (1 - b1) * g
//! v <- b2 * v + (1 - b2) * g^2
//! x <- x - lr * (m / (1 - b1^t)) / (sqrt(v / (1 - b2^t)) + eps)
//! ```

use serde::{Deserialize, Serialize};

use super::allocation::AllocationParameters;
use super::error::ComputeError;
use super::loss::AllocationGradients;

/// Hyper-parameters of the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl AdamConfig {
    /// Default moment decay rates with the given learning rate.
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Moment accumulators, shaped like the parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    /// First raw moment (running mean of gradients).
    pub first_moment: AllocationGradients,
    /// Second raw moment (running mean of squared gradients).
    pub second_moment: AllocationGradients,
    /// Number of updates applied so far.
    pub step: u64,
}

impl OptimizerState {
    fn new(num_events: usize) -> Self {
        Self {
            first_moment: AllocationGradients::zeros(num_events),
            second_moment: AllocationGradients::zeros(num_events),
            step: 0,
        }
    }
}

/// Adam optimizer bound to one run.
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    config: AdamConfig,
    state: OptimizerState,
    num_events: usize,
}

impl AdamOptimizer {
    /// Create an optimizer with zeroed moments for `num_events` events.
    pub fn new(config: AdamConfig, num_events: usize) -> Self {
        Self {
            config,
            state: OptimizerState::new(num_events),
            num_events,
        }
    }

    /// Hyper-parameters this optimizer was built with.
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    /// Apply one update to `params` in place.
    ///
    /// # Errors
    /// Returns [`ComputeError::DimensionMismatch`] if the parameters or the
    /// gradient do not match the optimizer's event count. Nothing is
    /// mutated in that case.
    pub fn step(
        &mut self,
        params: &mut AllocationParameters,
        grads: &AllocationGradients,
    ) -> Result<(), ComputeError> {
        params.check_dimensions(self.num_events)?;
        for (what, found) in [
            ("gradient phi_yes", grads.phi_yes.len()),
            ("gradient phi_no", grads.phi_no.len()),
        ] {
            if found != self.num_events {
                return Err(ComputeError::DimensionMismatch {
                    what,
                    expected: self.num_events,
                    found,
                });
            }
        }

        self.state.step += 1;
        let t = self.state.step;
        let c = &self.config;
        let bias1 = 1.0 - c.beta1.powf(t as f64);
        let bias2 = 1.0 - c.beta2.powf(t as f64);
        let rule = AdamRule {
            learning_rate: c.learning_rate,
            beta1: c.beta1,
            beta2: c.beta2,
            epsilon: c.epsilon,
            bias1,
            bias2,
        };

        let m = &mut self.state.first_moment;
        let v = &mut self.state.second_moment;

        rule.apply(&mut params.theta_yes, &mut m.theta_yes, &mut v.theta_yes, grads.theta_yes);
        rule.apply(&mut params.theta_no, &mut m.theta_no, &mut v.theta_no, grads.theta_no);
        for i in 0..self.num_events {
            rule.apply(
                &mut params.phi_yes[i],
                &mut m.phi_yes[i],
                &mut v.phi_yes[i],
                grads.phi_yes[i],
            );
            rule.apply(
                &mut params.phi_no[i],
                &mut m.phi_no[i],
                &mut v.phi_no[i],
                grads.phi_no[i],
            );
        }

        Ok(())
    }
}

/// Per-step constants of the update rule.
#[derive(Debug, Clone, Copy)]
struct AdamRule {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    bias1: f64,
    bias2: f64,
}

impl AdamRule {
    fn apply(&self, x: &mut f64, m: &mut f64, v: &mut f64, g: f64) {
        *m = self.beta1 * *m + (1.0 - self.beta1) * g;
        *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
        let m_hat = *m / self.bias1;
        let v_hat = *v / self.bias2;
        *x -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
    }
}
