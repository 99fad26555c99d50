//! Market snapshot for a set of binary events.
//!
//! Holds the quoted YES price and the assumed true probability of each
//! event. Prices are clipped away from 0 and 1 for every division and
//! logarithm downstream; the raw quote is kept for payoff accounting,
//! which must settle against the price actually paid.

use serde::{Deserialize, Serialize};

use super::error::InputError;

/// Numerical floor shared by price clipping and wealth-ratio clipping.
pub const EPSILON: f64 = 1e-6;

/// Clip a price into `[EPSILON, 1 - EPSILON]`.
///
/// NaN is passed through untouched.
pub fn clip_price(price: f64) -> f64 {
    if price < EPSILON {
        EPSILON
    } else if price > 1.0 - EPSILON {
        1.0 - EPSILON
    } else {
        price
    }
}

/// Immutable market snapshot consumed by one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketModel {
    /// Raw market prices, used for payoffs.
    prices: Vec<f64>,
    /// Prices clipped into `[EPSILON, 1 - EPSILON]`, used for share counts.
    adjusted_prices: Vec<f64>,
    /// Assumed probability that each event resolves YES.
    true_probabilities: Vec<f64>,
}

impl MarketModel {
    /// Build a market from parallel price / probability arrays.
    ///
    /// # Errors
    /// Returns [`InputError`] when either array is empty or the lengths
    /// differ.
    pub fn new(prices: Vec<f64>, true_probabilities: Vec<f64>) -> Result<Self, InputError> {
        if prices.is_empty() || true_probabilities.is_empty() {
            return Err(InputError::Empty {
                prices: prices.len(),
                probabilities: true_probabilities.len(),
            });
        }
        if prices.len() != true_probabilities.len() {
            return Err(InputError::LengthMismatch {
                prices: prices.len(),
                probabilities: true_probabilities.len(),
            });
        }

        let adjusted_prices = prices.iter().copied().map(clip_price).collect();

        Ok(Self {
            prices,
            adjusted_prices,
            true_probabilities,
        })
    }

    /// Number of events in the snapshot (always >= 1).
    pub fn num_events(&self) -> usize {
        self.prices.len()
    }

    /// Unclipped market prices.
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Clipped prices (`priceAdj`).
    pub fn adjusted_prices(&self) -> &[f64] {
        &self.adjusted_prices
    }

    /// Assumed YES probabilities.
    pub fn true_probabilities(&self) -> &[f64] {
        &self.true_probabilities
    }

    /// Per-event edge of a YES share: true probability minus raw price.
    pub fn edges(&self) -> impl Iterator<Item = f64> + '_ {
        self.true_probabilities
            .iter()
            .zip(&self.prices)
            .map(|(p, price)| p - price)
    }
}
