//! Voxel data structures for the Cubeterra voxel world.
//!
//! - [`VoxelGrid`]: dense per-chunk block storage, the raw data leaf.
//! - [`Octree`]: read-only spatial index built from a grid, answering
//!   box-overlap and ray queries against solid voxels.

pub mod grid;
pub mod octree;

pub use grid::VoxelGrid;
pub use octree::{Octree, OctreeNode};

use cubeterra_core::types::BlockType;

/// Read access to a cubic block volume addressed by local voxel coordinates.
pub trait VoxelStorage {
    /// Block at the given coordinates.
    fn get(&self, x: u32, y: u32, z: u32) -> BlockType;

    /// Edge length of the volume in voxels.
    fn size(&self) -> u32;

    /// True when every voxel is air.
    fn is_empty(&self) -> bool;

    /// Approximate heap and inline memory used, in bytes.
    fn memory_usage(&self) -> usize;
}
