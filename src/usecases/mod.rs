//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the allocator's workflow.
//!
//! Use cases:
//! - `TrainingLoop`: Validate inputs, run the Adam/Monte-Carlo loop,
//!   detect divergence, compile the allocation report

pub mod training_loop;

pub use training_loop::{RunOutcome, RunRequest, RunState, TrainingLoop};
