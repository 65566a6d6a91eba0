//! Error types for the figure assembly engine.

pub mod types;

pub use types::{AssemblyStage, SeparationError};

/// Convenience alias for results produced by the engine.
pub type SeparationResult<T> = Result<T, SeparationError>;
