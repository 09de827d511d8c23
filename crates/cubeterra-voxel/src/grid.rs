//! Dense voxel grid.

use cubeterra_core::constants::CHUNK_SIZE;
use cubeterra_core::coords::LocalPos;
use cubeterra_core::types::BlockType;
use glam::UVec3;

use crate::VoxelStorage;

/// A dense cube of block types, `size` voxels per axis.
///
/// Storage is x-fastest: index = `x + y * size + z * size * size`.
/// Indexing outside `[0, size)` panics; it indicates a coordinate conversion
/// bug in the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    size: u32,
    blocks: Box<[BlockType]>,
}

impl VoxelGrid {
    /// Create an all-air grid.
    ///
    /// # Panics
    /// Panics if `size` is not a non-zero power of two.
    pub fn new(size: u32) -> Self {
        assert!(
            size.is_power_of_two(),
            "voxel grid size must be a non-zero power of two, got {size}"
        );
        let len = (size as usize).pow(3);
        Self {
            size,
            blocks: vec![BlockType::Air; len].into_boxed_slice(),
        }
    }

    /// Create an all-air grid of chunk size.
    pub fn chunk() -> Self {
        Self::new(CHUNK_SIZE as u32)
    }

    /// Create a grid by evaluating `f` once per cell, in storage order.
    pub fn from_fn(size: u32, mut f: impl FnMut(UVec3) -> BlockType) -> Self {
        let mut grid = Self::new(size);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let index = grid.index(x, y, z);
                    grid.blocks[index] = f(UVec3::new(x, y, z));
                }
            }
        }
        grid
    }

    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        assert!(
            x < self.size && y < self.size && z < self.size,
            "voxel ({x}, {y}, {z}) outside grid of size {}",
            self.size
        );
        let size = self.size as usize;
        x as usize + y as usize * size + z as usize * size * size
    }

    /// Set the block at the given coordinates.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, z: u32, block: BlockType) {
        let index = self.index(x, y, z);
        self.blocks[index] = block;
    }

    /// Block at a chunk-local position.
    ///
    /// # Panics
    /// Panics if the grid is not chunk-sized.
    #[inline]
    pub fn get_local(&self, pos: LocalPos) -> BlockType {
        assert_eq!(self.size as usize, CHUNK_SIZE, "local positions address chunk grids");
        self.blocks[pos.to_index()]
    }

    /// Fill an axis-aligned region `[min, max)` with a block type.
    pub fn fill(&mut self, min: UVec3, max: UVec3, block: BlockType) {
        for z in min.z..max.z {
            for y in min.y..max.y {
                for x in min.x..max.x {
                    self.set(x, y, z, block);
                }
            }
        }
    }

    /// Blocks in storage order.
    #[inline]
    pub fn as_slice(&self) -> &[BlockType] {
        &self.blocks
    }

    /// Raw block ids in storage order, for mesh extraction.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks[..])
    }

    /// Iterate over every cell with its coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (UVec3, BlockType)> + '_ {
        let size = self.size;
        self.blocks.iter().enumerate().map(move |(i, &block)| {
            let i = i as u32;
            (UVec3::new(i % size, (i / size) % size, i / (size * size)), block)
        })
    }

    /// Number of solid voxels.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_solid()).count()
    }
}

impl VoxelStorage for VoxelGrid {
    #[inline]
    fn get(&self, x: u32, y: u32, z: u32) -> BlockType {
        self.blocks[self.index(x, y, z)]
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.blocks.len() * std::mem::size_of::<BlockType>()
    }
}

impl std::fmt::Debug for VoxelGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoxelGrid")
            .field("size", &self.size)
            .field("solid", &self.solid_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_empty() {
        let grid = VoxelGrid::new(8);
        assert!(grid.is_empty());
        assert_eq!(grid.size(), 8);
        assert_eq!(grid.as_slice().len(), 512);
    }

    #[test]
    fn set_and_get() {
        let mut grid = VoxelGrid::new(4);
        grid.set(1, 2, 3, BlockType::Stone);
        assert_eq!(grid.get(1, 2, 3), BlockType::Stone);
        assert_eq!(grid.get(3, 2, 1), BlockType::Air);
        assert!(!grid.is_empty());
        assert_eq!(grid.solid_count(), 1);
    }

    #[test]
    fn from_fn_visits_every_cell_once() {
        let mut calls = 0;
        let grid = VoxelGrid::from_fn(4, |p| {
            calls += 1;
            if p.y == 0 {
                BlockType::Bedrock
            } else {
                BlockType::Air
            }
        });
        assert_eq!(calls, 64);
        assert_eq!(grid.solid_count(), 16);
        assert_eq!(grid.get(3, 0, 3), BlockType::Bedrock);
    }

    #[test]
    fn iter_matches_get() {
        let grid = VoxelGrid::from_fn(4, |p| {
            if (p.x + p.y + p.z) % 2 == 0 {
                BlockType::Dirt
            } else {
                BlockType::Air
            }
        });
        for (pos, block) in grid.iter() {
            assert_eq!(grid.get(pos.x, pos.y, pos.z), block);
        }
    }

    #[test]
    fn bytes_are_block_ids() {
        let mut grid = VoxelGrid::new(2);
        grid.set(1, 0, 0, BlockType::Water);
        assert_eq!(grid.as_bytes()[1], BlockType::Water.id());
        assert_eq!(grid.as_bytes()[0], 0);
    }

    #[test]
    fn local_pos_addresses_chunk_grid() {
        let mut grid = VoxelGrid::chunk();
        grid.set(5, 6, 7, BlockType::Sand);
        assert_eq!(grid.get_local(LocalPos::new(5, 6, 7)), BlockType::Sand);
    }

    #[test]
    #[should_panic(expected = "outside grid")]
    fn out_of_range_panics() {
        let grid = VoxelGrid::new(4);
        let _ = grid.get(4, 0, 0);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_panics() {
        let _ = VoxelGrid::new(6);
    }
}
