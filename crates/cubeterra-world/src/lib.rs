//! World generation and chunk streaming for the Cubeterra voxel world.
//!
//! - [`TerrainGenerator`]: deterministic world position to block type, with a
//!   noise-driven implementation banded by [`TerrainLevels`].
//! - [`Chunk`]: a generated block grid with its octree index.
//! - [`ChunkManager`]: keeps the chunks around a moving viewer live, generating
//!   them on a worker pool.

pub mod chunk;
pub mod chunk_manager;
pub mod generation;
pub mod levels;
pub mod streaming;

pub use chunk::{Chunk, ChunkSource};
pub use chunk_manager::{ChunkManager, ChunkManagerBuilder};
pub use generation::{NoiseTerrainGenerator, TerrainConfig, TerrainGenerator};
pub use levels::TerrainLevels;
pub use streaming::{
    chunks_in_view, ChunkEvent, ChunkState, StreamingConfig, MAX_VIEW_DISTANCE,
};

/// World seed for procedural generation.
pub type WorldSeed = u64;
