//! Domain layer - Kelly allocation math.
//!
//! Pure, synchronous logic: the market snapshot, the softmax
//! parameterization, the Monte-Carlo Kelly loss with its hand-derived
//! gradient, the Adam optimizer and the final report. No I/O, no runtime;
//! randomness comes in through a caller-supplied `rand::Rng`.

pub mod adam;
pub mod allocation;
pub mod error;
pub mod loss;
pub mod market;
pub mod report;
pub mod sampling;

// Re-export core types for convenience
pub use adam::{AdamConfig, AdamOptimizer, OptimizerState};
pub use allocation::{Allocation, AllocationParameters};
pub use error::{ComputeError, InputError};
pub use loss::{AllocationGradients, LossEvaluation, StochasticLoss};
pub use market::{EPSILON, MarketModel};
pub use report::{AllocationReport, EventPosition, PositionSide};
pub use sampling::BatchSample;
