//! Octree spatial index over a voxel grid.
//!
//! Built once from a [`VoxelGrid`] and read-only afterwards. Uniform subtrees
//! collapse to a single node, so large air regions cost one node to skip.
//! All queries are in grid-local space: voxel `(x, y, z)` is the unit cube at
//! `(x, y, z)`.

use cubeterra_core::math::{Aabb, Ray};
use cubeterra_core::types::BlockType;
use glam::{UVec3, Vec3};

use crate::grid::VoxelGrid;
use crate::VoxelStorage;

/// A node in the octree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OctreeNode {
    /// Empty node (all voxels are air).
    #[default]
    Empty,
    /// Uniform node, every voxel in the cube has this block type.
    Leaf(BlockType),
    /// Branch node with 8 children.
    Branch(Box<[OctreeNode; 8]>),
}

impl OctreeNode {
    /// Check if the node is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Check if the node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Check if the node is a branch.
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }

    /// Get the block type if this is a leaf node.
    pub fn as_leaf(&self) -> Option<BlockType> {
        match self {
            Self::Leaf(block) => Some(*block),
            _ => None,
        }
    }

    /// Get children if this is a branch node.
    pub fn as_branch(&self) -> Option<&[OctreeNode; 8]> {
        match self {
            Self::Branch(children) => Some(children),
            _ => None,
        }
    }

    /// True when no voxel under this node can block movement.
    #[inline]
    fn is_passable(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Leaf(block) => !block.is_solid(),
            Self::Branch(_) => false,
        }
    }

    /// Count total nodes in this subtree.
    pub fn count_nodes(&self) -> usize {
        match self {
            Self::Empty | Self::Leaf(_) => 1,
            Self::Branch(children) => {
                1 + children.iter().map(OctreeNode::count_nodes).sum::<usize>()
            }
        }
    }

    /// Calculate memory usage of this subtree.
    pub fn memory_usage(&self) -> usize {
        match self {
            Self::Empty | Self::Leaf(_) => std::mem::size_of::<Self>(),
            Self::Branch(children) => {
                std::mem::size_of::<Self>()
                    + std::mem::size_of::<[OctreeNode; 8]>()
                    + children.iter().map(OctreeNode::memory_usage).sum::<usize>()
            }
        }
    }
}

/// Read-only octree built from a voxel grid.
#[derive(Clone, Debug)]
pub struct Octree {
    root: OctreeNode,
    depth: u32,
}

impl Octree {
    /// Build the index top-down from a grid.
    pub fn build(grid: &VoxelGrid) -> Self {
        let size = grid.size();
        let _span = tracing::trace_span!("octree_build", size).entered();
        Self {
            root: Self::build_node(grid, UVec3::ZERO, size),
            depth: size.trailing_zeros(),
        }
    }

    /// Offset of child `index` in units of the child size.
    ///
    /// Bit 0 selects x, bit 1 selects y, bit 2 selects z.
    #[inline]
    fn child_offset(index: usize) -> UVec3 {
        UVec3::new(
            (index & 1) as u32,
            ((index >> 1) & 1) as u32,
            ((index >> 2) & 1) as u32,
        )
    }

    fn build_node(grid: &VoxelGrid, origin: UVec3, size: u32) -> OctreeNode {
        if size == 1 {
            let block = grid.get(origin.x, origin.y, origin.z);
            return if block.is_air() {
                OctreeNode::Empty
            } else {
                OctreeNode::Leaf(block)
            };
        }

        let half = size / 2;
        let children: [OctreeNode; 8] = std::array::from_fn(|i| {
            Self::build_node(grid, origin + Self::child_offset(i) * half, half)
        });

        // Collapse uniform children
        let first = &children[0];
        if !first.is_branch() && children[1..].iter().all(|c| c == first) {
            return first.clone();
        }

        OctreeNode::Branch(Box::new(children))
    }

    /// Get the root node.
    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// Bounds of the indexed volume in local space.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::splat(self.size() as f32))
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }

    /// True if any solid voxel overlaps `aabb` with non-zero volume.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        Self::intersects_node(&self.root, Vec3::ZERO, self.size() as f32, aabb)
    }

    fn intersects_node(node: &OctreeNode, origin: Vec3, size: f32, aabb: &Aabb) -> bool {
        if node.is_passable() {
            return false;
        }
        let cube = Aabb::new(origin, origin + Vec3::splat(size));
        if !cube.intersects(aabb) {
            return false;
        }
        match node {
            OctreeNode::Branch(children) => {
                let half = size * 0.5;
                children.iter().enumerate().any(|(i, child)| {
                    let offset = Self::child_offset(i).as_vec3() * half;
                    Self::intersects_node(child, origin + offset, half, aabb)
                })
            }
            // Solid leaf overlapping the box
            _ => true,
        }
    }

    /// Append the entry distance of every solid leaf the ray crosses.
    ///
    /// Distances are measured from the ray origin; the order is unspecified.
    pub fn ray_distances(&self, ray: &Ray, out: &mut Vec<f32>) {
        Self::collect_hits(&self.root, Vec3::ZERO, self.size() as f32, ray, out);
    }

    fn collect_hits(node: &OctreeNode, origin: Vec3, size: f32, ray: &Ray, out: &mut Vec<f32>) {
        if node.is_passable() {
            return;
        }
        let cube = Aabb::new(origin, origin + Vec3::splat(size));
        let Some((t_near, _)) = cube.intersect_ray(ray) else {
            return;
        };
        match node {
            OctreeNode::Branch(children) => {
                let half = size * 0.5;
                for (i, child) in children.iter().enumerate() {
                    let offset = Self::child_offset(i).as_vec3() * half;
                    Self::collect_hits(child, origin + offset, half, ray, out);
                }
            }
            _ => out.push(t_near),
        }
    }

    /// Distance to the closest solid leaf along the ray.
    pub fn nearest_hit(&self, ray: &Ray) -> Option<f32> {
        let mut best = None;
        Self::nearest_in(&self.root, Vec3::ZERO, self.size() as f32, ray, &mut best);
        best
    }

    fn nearest_in(node: &OctreeNode, origin: Vec3, size: f32, ray: &Ray, best: &mut Option<f32>) {
        if node.is_passable() {
            return;
        }
        let cube = Aabb::new(origin, origin + Vec3::splat(size));
        let Some((t_near, _)) = cube.intersect_ray(ray) else {
            return;
        };
        if best.is_some_and(|b| t_near >= b) {
            return;
        }
        match node {
            OctreeNode::Branch(children) => {
                let half = size * 0.5;
                for (i, child) in children.iter().enumerate() {
                    let offset = Self::child_offset(i).as_vec3() * half;
                    Self::nearest_in(child, origin + offset, half, ray, best);
                }
            }
            _ => *best = Some(t_near),
        }
    }

    /// Number of non-air leaves.
    pub fn leaf_count(&self) -> usize {
        Self::count_leaves(&self.root)
    }

    fn count_leaves(node: &OctreeNode) -> usize {
        match node {
            OctreeNode::Empty => 0,
            OctreeNode::Leaf(_) => 1,
            OctreeNode::Branch(children) => children.iter().map(Self::count_leaves).sum(),
        }
    }

    /// Local-space cubes of every non-air leaf with its block type.
    pub fn leaves(&self) -> Vec<(Aabb, BlockType)> {
        let mut out = Vec::new();
        Self::collect_leaves(&self.root, Vec3::ZERO, self.size() as f32, &mut out);
        out
    }

    fn collect_leaves(node: &OctreeNode, origin: Vec3, size: f32, out: &mut Vec<(Aabb, BlockType)>) {
        match node {
            OctreeNode::Empty => {}
            OctreeNode::Leaf(block) => {
                out.push((Aabb::new(origin, origin + Vec3::splat(size)), *block));
            }
            OctreeNode::Branch(children) => {
                let half = size * 0.5;
                for (i, child) in children.iter().enumerate() {
                    let offset = Self::child_offset(i).as_vec3() * half;
                    Self::collect_leaves(child, origin + offset, half, out);
                }
            }
        }
    }

    fn get_recursive(node: &OctreeNode, x: u32, y: u32, z: u32, level: u32) -> BlockType {
        match node {
            OctreeNode::Empty => BlockType::Air,
            OctreeNode::Leaf(block) => *block,
            OctreeNode::Branch(children) => {
                debug_assert!(level > 0, "branch below voxel level");
                let bit = 1 << (level - 1);
                let idx = usize::from(x & bit != 0)
                    | (usize::from(y & bit != 0) << 1)
                    | (usize::from(z & bit != 0) << 2);
                Self::get_recursive(&children[idx], x, y, z, level - 1)
            }
        }
    }
}

impl VoxelStorage for Octree {
    fn get(&self, x: u32, y: u32, z: u32) -> BlockType {
        let size = self.size();
        assert!(
            x < size && y < size && z < size,
            "voxel ({x}, {y}, {z}) outside octree of size {size}"
        );
        Self::get_recursive(&self.root, x, y, z, self.depth)
    }

    fn size(&self) -> u32 {
        1 << self.depth
    }

    fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.root.memory_usage()
    }
}
