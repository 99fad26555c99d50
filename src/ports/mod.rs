//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ProgressSink`: Streaming run events (progress log, diagnostics, report)

pub mod progress;

pub use progress::{IterationProgress, ProgressEvent, ProgressSink, RunDiagnostic, RunSummary};
