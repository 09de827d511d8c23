//! Physical state of a box-shaped entity.

use cubeterra_core::math::Aabb;
use cubeterra_world::ChunkSource;
use glam::Vec3;

use crate::collision::EntityPhysics;
use crate::{HasBounds, HasVelocity};

/// Box-shaped body moved by [`EntityPhysics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsBody {
    /// Center of the bounding box.
    pub position: Vec3,
    /// Full extent of the bounding box.
    pub size: Vec3,
    /// Vertical velocity, positive up.
    pub velocity_y: f32,
    /// Whether the last downward move was stopped by a surface.
    pub on_ground: bool,
}

impl PhysicsBody {
    /// Create a resting body centered at `position`.
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            size,
            velocity_y: 0.0,
            on_ground: false,
        }
    }

    /// Resolve `proposed` against the world and apply the result.
    pub fn step<S>(
        &mut self,
        physics: &EntityPhysics,
        chunks: &S,
        proposed: Vec3,
        dt: f32,
    ) -> Resolution
    where
        S: ChunkSource + ?Sized,
    {
        let resolution = physics.resolve_translation(chunks, self, proposed, dt);
        self.apply(&resolution);
        resolution
    }

    /// Apply a resolution computed for this body.
    pub fn apply(&mut self, resolution: &Resolution) {
        self.position += resolution.translation;
        self.velocity_y = resolution.vertical_velocity;
        self.on_ground = resolution.on_ground;
    }
}

impl HasBounds for PhysicsBody {
    fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }
}

impl HasVelocity for PhysicsBody {
    fn vertical_velocity(&self) -> f32 {
        self.velocity_y
    }

    fn set_vertical_velocity(&mut self, velocity: f32) {
        self.velocity_y = velocity;
    }
}

/// Outcome of resolving one tick of movement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    /// Translation that keeps the body out of solid voxels.
    pub translation: Vec3,
    /// New on-ground flag.
    pub on_ground: bool,
    /// New vertical velocity.
    pub vertical_velocity: f32,
}
