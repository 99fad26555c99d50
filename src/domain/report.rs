//! Final allocation report.
//!
//! Deterministic given trained parameters: share counts are recomputed,
//! offsetting YES/NO pairs on the same event are netted out (a pair always
//! pays exactly $1, so holding both is just cash), and the remaining
//! positions are costed at the clipped price.

use serde::{Deserialize, Serialize};

use super::allocation::{Allocation, AllocationParameters};
use super::error::ComputeError;
use super::market::MarketModel;

/// Net share counts at or below this are shown as no position.
pub const POSITION_TOLERANCE: f64 = 1e-9;

/// Which side of an event carries the net position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Yes,
    No,
    Flat,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "Yes"),
            Self::No => write!(f, "No"),
            Self::Flat => write!(f, "-"),
        }
    }
}

/// One event's line in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPosition {
    /// Zero-based event index.
    pub event: usize,
    /// Side holding the net position.
    pub side: PositionSide,
    /// Net shares on `side` (0 when flat).
    pub shares: f64,
    /// Capital committed to the net position.
    pub capital: f64,
    /// YES shares left after hedge-cancellation.
    pub yes_net: f64,
    /// NO shares left after hedge-cancellation.
    pub no_net: f64,
    /// Shares removed from each side by hedge-cancellation.
    pub canceled: f64,
    /// Weight of this event within the YES side.
    pub alpha_yes: f64,
    /// Weight of this event within the NO side.
    pub alpha_no: f64,
}

/// Aggregate and per-event view of a trained allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    /// Initial wealth `W`.
    pub wealth: f64,
    /// Fraction of wealth assigned to the YES side.
    pub f_yes: f64,
    /// Fraction of wealth assigned to the NO side.
    pub f_no: f64,
    /// Cost of the net YES positions.
    pub total_yes_cost: f64,
    /// Cost of the net NO positions.
    pub total_no_cost: f64,
    /// `total_yes_cost + total_no_cost`.
    pub net_capital_deployed: f64,
    /// Sum of canceled share pairs, counted as cash.
    pub cash_from_cancel: f64,
    /// `W - net_capital_deployed - cash_from_cancel`.
    pub unallocated_cash: f64,
    /// One entry per event, in input order.
    pub positions: Vec<EventPosition>,
}

impl AllocationReport {
    /// Compile the report from final parameters.
    ///
    /// # Errors
    /// Returns [`ComputeError::DimensionMismatch`] if the parameters do not
    /// fit the market.
    pub fn compile(
        params: &AllocationParameters,
        market: &MarketModel,
        wealth: f64,
    ) -> Result<Self, ComputeError> {
        let alloc = Allocation::from_parameters(params, market, wealth)?;
        let prices = market.adjusted_prices();

        let mut positions = Vec::with_capacity(market.num_events());
        let mut total_yes_cost = 0.0;
        let mut total_no_cost = 0.0;
        let mut cash_from_cancel = 0.0;

        for (i, &q) in prices.iter().enumerate() {
            let (n_yes, n_no) = (alloc.n_yes[i], alloc.n_no[i]);
            let canceled = n_yes.min(n_no);
            let yes_net = n_yes - canceled;
            let no_net = n_no - canceled;

            cash_from_cancel += canceled;
            total_yes_cost += yes_net * q;
            total_no_cost += no_net * (1.0 - q);

            let (side, shares, capital) = if yes_net > no_net && yes_net > POSITION_TOLERANCE {
                (PositionSide::Yes, yes_net, yes_net * q)
            } else if no_net > POSITION_TOLERANCE {
                (PositionSide::No, no_net, no_net * (1.0 - q))
            } else {
                (PositionSide::Flat, 0.0, 0.0)
            };

            positions.push(EventPosition {
                event: i,
                side,
                shares,
                capital,
                yes_net,
                no_net,
                canceled,
                alpha_yes: alloc.alpha_yes[i],
                alpha_no: alloc.alpha_no[i],
            });
        }

        let net_capital_deployed = total_yes_cost + total_no_cost;
        let unallocated_cash = wealth - net_capital_deployed - cash_from_cancel;

        Ok(Self {
            wealth,
            f_yes: alloc.f_yes,
            f_no: alloc.f_no,
            total_yes_cost,
            total_no_cost,
            net_capital_deployed,
            cash_from_cancel,
            unallocated_cash,
            positions,
        })
    }

    /// `W - (deployed + canceled + unallocated)`; zero up to rounding.
    pub fn accounting_residual(&self) -> f64 {
        self.wealth - (self.net_capital_deployed + self.cash_from_cancel + self.unallocated_cash)
    }

    /// Number of events with a non-flat net position.
    pub fn active_positions(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| p.side != PositionSide::Flat)
            .count()
    }
}
