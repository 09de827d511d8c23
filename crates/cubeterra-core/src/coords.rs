//! Coordinate systems for the voxel world.
//!
//! One voxel occupies one world unit: the voxel at integer [`WorldPos`]
//! `(x, y, z)` covers the half-open cube `[x, x + 1) × [y, y + 1) × [z, z + 1)`.
//! Chunk `(cx, cy, cz)` covers the voxels starting at `c * CHUNK_SIZE`.

use crate::constants::{CHUNK_BITS, CHUNK_EXTENT, CHUNK_SIZE};
use crate::math::Aabb;
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Position within a chunk (0 to CHUNK_SIZE-1 per axis).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// Create a new local position
    #[inline]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_SIZE);
        debug_assert!((y as usize) < CHUNK_SIZE);
        debug_assert!((z as usize) < CHUNK_SIZE);
        Self { x, y, z }
    }

    /// Convert to linear index for flat array storage
    #[inline]
    pub const fn to_index(self) -> usize {
        self.x as usize
            + (self.y as usize) * CHUNK_SIZE
            + (self.z as usize) * CHUNK_SIZE * CHUNK_SIZE
    }

    /// Create from linear index
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        let x = (index % CHUNK_SIZE) as u8;
        let y = ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8;
        let z = (index / (CHUNK_SIZE * CHUNK_SIZE)) as u8;
        Self { x, y, z }
    }
}

/// Chunk index in chunk coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Create a new chunk position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the given world-space point.
    #[inline]
    pub fn from_world(point: Vec3) -> Self {
        WorldPos::from(point).chunk_pos()
    }

    /// Convert to world position (minimum corner of chunk)
    #[inline]
    pub const fn to_world_pos(self) -> WorldPos {
        WorldPos::new(
            (self.x as i64) << CHUNK_BITS,
            (self.y as i64) << CHUNK_BITS,
            (self.z as i64) << CHUNK_BITS,
        )
    }

    /// World-space minimum corner.
    #[inline]
    pub fn origin(self) -> Vec3 {
        self.to_world_pos().to_vec3()
    }

    /// World-space center of the chunk.
    #[inline]
    pub fn center(self) -> Vec3 {
        self.origin() + Vec3::splat(CHUNK_EXTENT * 0.5)
    }

    /// World-space bounding box of the chunk.
    #[inline]
    pub fn bounds(self) -> Aabb {
        let origin = self.origin();
        Aabb::new(origin, origin + Vec3::splat(CHUNK_EXTENT))
    }

    /// Squared distance from the chunk center to a world-space point.
    #[inline]
    pub fn center_distance_sq(self, point: Vec3) -> f32 {
        self.center().distance_squared(point)
    }

    /// Get the six neighboring chunk positions
    pub fn neighbors(self) -> [ChunkPos; 6] {
        [
            ChunkPos::new(self.x - 1, self.y, self.z),
            ChunkPos::new(self.x + 1, self.y, self.z),
            ChunkPos::new(self.x, self.y - 1, self.z),
            ChunkPos::new(self.x, self.y + 1, self.z),
            ChunkPos::new(self.x, self.y, self.z - 1),
            ChunkPos::new(self.x, self.y, self.z + 1),
        ]
    }

    /// All chunk positions in the cube of the given radius around this one,
    /// including itself. Radius 1 yields the 27-neighborhood.
    pub fn neighborhood(self, radius: i32) -> impl Iterator<Item = ChunkPos> {
        (-radius..=radius).flat_map(move |dy| {
            (-radius..=radius).flat_map(move |dz| {
                (-radius..=radius)
                    .map(move |dx| ChunkPos::new(self.x + dx, self.y + dy, self.z + dz))
            })
        })
    }

    /// Convert to glam IVec3
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for ChunkPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// World position in voxel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl WorldPos {
    /// Create a new world position
    #[inline]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk containing this position
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(
            (self.x >> CHUNK_BITS) as i32,
            (self.y >> CHUNK_BITS) as i32,
            (self.z >> CHUNK_BITS) as i32,
        )
    }

    /// Get the local position within the chunk
    #[inline]
    pub const fn local_pos(self) -> LocalPos {
        let mask = (CHUNK_SIZE - 1) as i64;
        LocalPos::new(
            (self.x & mask) as u8,
            (self.y & mask) as u8,
            (self.z & mask) as u8,
        )
    }

    /// Split into chunk and local position
    #[inline]
    pub const fn split(self) -> (ChunkPos, LocalPos) {
        (self.chunk_pos(), self.local_pos())
    }

    /// Create from chunk and local position
    #[inline]
    pub const fn from_chunk_local(chunk: ChunkPos, local: LocalPos) -> Self {
        Self::new(
            ((chunk.x as i64) << CHUNK_BITS) + local.x as i64,
            ((chunk.y as i64) << CHUNK_BITS) + local.y as i64,
            ((chunk.z as i64) << CHUNK_BITS) + local.z as i64,
        )
    }

    /// Position offset by the given number of voxels.
    #[inline]
    pub const fn offset(self, dx: i64, dy: i64, dz: i64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Convert to floating point Vec3 (minimum corner of the voxel)
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<Vec3> for WorldPos {
    fn from(v: Vec3) -> Self {
        Self::new(v.x.floor() as i64, v.y.floor() as i64, v.z.floor() as i64)
    }
}
