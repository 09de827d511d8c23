//! Generated chunks and their spatial queries.

use std::sync::Arc;

use cubeterra_core::constants::{CHUNK_EXTENT, CHUNK_SIZE};
use cubeterra_core::coords::{ChunkPos, WorldPos};
use cubeterra_core::math::{Aabb, Ray};
use cubeterra_core::types::BlockType;
use cubeterra_voxel::{Octree, VoxelGrid, VoxelStorage};
use glam::Vec3;
use hashbrown::HashMap;
use tracing::trace_span;

use crate::generation::TerrainGenerator;

/// A generated chunk: block grid, octree index and world-space bounds.
///
/// Immutable once built. Regenerating a chunk means replacing the whole value,
/// so a chunk can be shared behind an `Arc` and queried from any thread.
pub struct Chunk {
    pos: ChunkPos,
    grid: VoxelGrid,
    index: Octree,
    bounds: Aabb,
}

impl Chunk {
    /// Generate the chunk at `pos` by evaluating `generator` for every voxel.
    pub fn generate<G>(pos: ChunkPos, generator: &G) -> Self
    where
        G: TerrainGenerator + ?Sized,
    {
        let _span = trace_span!("chunk_generate", x = pos.x, y = pos.y, z = pos.z).entered();

        let origin = pos.to_world_pos();
        let grid = VoxelGrid::from_fn(CHUNK_SIZE as u32, |p| {
            generator.block_at(origin.offset(i64::from(p.x), i64::from(p.y), i64::from(p.z)))
        });
        Self::from_grid(pos, grid)
    }

    /// Wrap an already filled grid and build its index.
    ///
    /// # Panics
    /// Panics if the grid is not chunk-sized.
    pub fn from_grid(pos: ChunkPos, grid: VoxelGrid) -> Self {
        assert_eq!(
            grid.size() as usize,
            CHUNK_SIZE,
            "chunk grids must be {CHUNK_SIZE} voxels per side"
        );
        let index = Octree::build(&grid);
        Self {
            pos,
            bounds: pos.bounds(),
            grid,
            index,
        }
    }

    /// Chunk-space coordinate.
    #[inline]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// World-space bounds.
    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// World-space center.
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.bounds.center()
    }

    /// Block grid, for mesh extraction.
    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Octree index over the grid.
    #[inline]
    pub fn index(&self) -> &Octree {
        &self.index
    }

    #[inline]
    fn origin(&self) -> Vec3 {
        self.bounds.min
    }

    /// True if any solid voxel overlaps the world-space `aabb`.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        if !self.bounds.intersects(aabb) {
            return false;
        }
        self.index.intersects(&aabb.translated(-self.origin()))
    }

    /// Alias of [`intersects`](Self::intersects) used by collision probes.
    #[inline]
    pub fn collides(&self, aabb: &Aabb) -> bool {
        self.intersects(aabb)
    }

    /// Distance from the ray origin to the entry point of every solid voxel
    /// region the ray crosses inside this chunk. Unordered; empty on a miss.
    pub fn intersection_distances(&self, ray: &Ray) -> Vec<f32> {
        let mut distances = Vec::new();
        if self.bounds.intersect_ray(ray).is_none() {
            return distances;
        }
        self.index
            .ray_distances(&ray.translated(-self.origin()), &mut distances);
        distances
    }

    /// Distance to the closest solid voxel along the ray.
    pub fn nearest_intersection(&self, ray: &Ray) -> Option<f32> {
        self.bounds.intersect_ray(ray)?;
        self.index.nearest_hit(&ray.translated(-self.origin()))
    }

    /// Block at a world position, `None` if it lies in another chunk.
    pub fn block_at(&self, pos: WorldPos) -> Option<BlockType> {
        let (chunk, local) = pos.split();
        (chunk == self.pos).then(|| self.grid.get_local(local))
    }

    /// True when the chunk holds only air.
    pub fn is_empty(&self) -> bool {
        self.index.root().is_empty()
    }

    /// Number of solid voxels.
    pub fn solid_count(&self) -> usize {
        self.grid.solid_count()
    }

    /// Approximate memory used by the grid and index, in bytes.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.grid.memory_usage() + self.index.memory_usage()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("solid", &self.solid_count())
            .field("nodes", &self.index.node_count())
            .finish_non_exhaustive()
    }
}

/// Lookup of live chunks by coordinate.
pub trait ChunkSource {
    /// The chunk at `pos`, if it is available.
    fn chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>>;

    /// Every available chunk in the cube of `radius` around `center`.
    fn chunks_around(&self, center: ChunkPos, radius: i32) -> Vec<Arc<Chunk>> {
        center
            .neighborhood(radius)
            .filter_map(|pos| self.chunk(pos))
            .collect()
    }

    /// Every available chunk whose bounds overlap `bounds`.
    ///
    /// The default looks up each coordinate in the box's chunk span, so
    /// sources holding few chunks should override it for long boxes.
    fn chunks_overlapping(&self, bounds: &Aabb) -> Vec<Arc<Chunk>> {
        let (lo, hi) = chunk_span(bounds);
        span_positions(lo, hi)
            .filter_map(|pos| self.chunk(pos))
            .filter(|chunk| chunk.bounds().intersects(bounds))
            .collect()
    }
}

impl<S: std::hash::BuildHasher> ChunkSource for HashMap<ChunkPos, Arc<Chunk>, S> {
    fn chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        self.get(&pos).cloned()
    }

    fn chunks_overlapping(&self, bounds: &Aabb) -> Vec<Arc<Chunk>> {
        overlapping_in(self, bounds)
    }
}

/// Inclusive range of chunk coordinates a box reaches into.
fn chunk_span(bounds: &Aabb) -> (ChunkPos, ChunkPos) {
    let lo = (bounds.min / CHUNK_EXTENT).floor().as_ivec3();
    let hi = (bounds.max / CHUNK_EXTENT).floor().as_ivec3();
    (ChunkPos::new(lo.x, lo.y, lo.z), ChunkPos::new(hi.x, hi.y, hi.z))
}

fn span_len(lo: ChunkPos, hi: ChunkPos) -> u64 {
    let extent = |a: i32, b: i32| (i64::from(b) - i64::from(a) + 1).max(0) as u64;
    extent(lo.x, hi.x)
        .saturating_mul(extent(lo.y, hi.y))
        .saturating_mul(extent(lo.z, hi.z))
}

fn span_positions(lo: ChunkPos, hi: ChunkPos) -> impl Iterator<Item = ChunkPos> {
    (lo.x..=hi.x).flat_map(move |x| {
        (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| ChunkPos::new(x, y, z)))
    })
}

/// Overlap query over a chunk map. Scans the map instead of the span when the
/// span holds more coordinates than the map holds chunks.
pub(crate) fn overlapping_in<S: std::hash::BuildHasher>(
    map: &HashMap<ChunkPos, Arc<Chunk>, S>,
    bounds: &Aabb,
) -> Vec<Arc<Chunk>> {
    let (lo, hi) = chunk_span(bounds);
    if span_len(lo, hi) > map.len() as u64 {
        map.values()
            .filter(|chunk| chunk.bounds().intersects(bounds))
            .cloned()
            .collect()
    } else {
        span_positions(lo, hi)
            .filter_map(|pos| map.get(&pos))
            .filter(|chunk| chunk.bounds().intersects(bounds))
            .cloned()
            .collect()
    }
}
