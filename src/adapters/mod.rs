//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Connects the training loop to the outside world: raw text input,
//! the progress port, and report rendering.
//!
//! Adapter categories:
//! - `input`: Lenient comma-separated parsing into a `RunRequest`
//! - `console`: `ProgressSink` that keeps an append-only text log
//! - `table`: Allocation report as text tables or JSON

pub mod console;
pub mod input;
pub mod table;
