//! Error types shared across the workspace.

use thiserror::Error;

use crate::coords::ChunkPos;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An entry was registered twice
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// A required collaborator was never provided
    #[error("Missing dependency: {0}")]
    Missing(&'static str),

    /// Worker pool could not be created
    #[error("Worker error: {0}")]
    Worker(String),

    /// Generating a single chunk failed
    #[error("Generation failed for chunk {pos:?}: {reason}")]
    Generation { pos: ChunkPos, reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
