//! Entity-versus-voxel collision for the Cubeterra voxel world.
//!
//! Bodies are axis-aligned boxes. Each tick [`EntityPhysics`] clamps a
//! proposed translation against the solid voxels of the surrounding chunks by
//! casting rays from the faces the body is moving through.

pub mod body;
pub mod collision;

pub use body::{PhysicsBody, Resolution};
pub use collision::{EntityPhysics, PhysicsConfig, MAX_BODY_EXTENT};

use cubeterra_core::math::Aabb;

/// Something with a world-space bounding box.
pub trait HasBounds {
    /// World-space bounds.
    fn bounds(&self) -> Aabb;
}

/// Something with a vertical velocity driven by gravity.
pub trait HasVelocity {
    /// Vertical velocity in world units per second, positive up.
    fn vertical_velocity(&self) -> f32;

    /// Replace the vertical velocity.
    fn set_vertical_velocity(&mut self, velocity: f32);
}
