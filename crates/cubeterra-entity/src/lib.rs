//! Entity system for the Cubeterra voxel world.
//!
//! Uses hecs as the ECS backend. Entities are composed from plain components;
//! [`physics_system`] moves every body through the streamed world each tick.

use cubeterra_physics::{EntityPhysics, PhysicsBody};
use cubeterra_world::ChunkSource;
use glam::Vec3;
use tracing::trace_span;

pub use hecs::{Entity, World};

/// Bounding box of a player, in world units.
pub const PLAYER_SIZE: Vec3 = Vec3::new(0.6, 1.8, 0.6);

/// Translation requested for the current tick. Cleared once applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub translation: Vec3,
}

/// Player controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    /// Horizontal speed in world units per second.
    pub walk_speed: f32,
    /// Vertical velocity given by a jump.
    pub jump_speed: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            walk_speed: 4.5,
            jump_speed: 8.0,
        }
    }
}

impl Player {
    /// Request a horizontal move along `direction` for `dt` seconds.
    ///
    /// The vertical component of `direction` is ignored.
    pub fn walk(&self, motion: &mut Motion, direction: Vec3, dt: f32) {
        let flat = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        let step = flat * self.walk_speed * dt;
        motion.translation.x += step.x;
        motion.translation.z += step.z;
    }

    /// Jump if standing on something. Returns whether the jump happened.
    pub fn jump(&self, body: &mut PhysicsBody) -> bool {
        if !body.on_ground {
            return false;
        }
        body.velocity_y = self.jump_speed;
        body.on_ground = false;
        true
    }
}

/// Spawn a player whose box is centered at `position`.
pub fn spawn_player(world: &mut World, position: Vec3) -> Entity {
    world.spawn((
        PhysicsBody::new(position, PLAYER_SIZE),
        Motion::default(),
        Player::default(),
    ))
}

/// Resolve and apply the pending motion of every entity with a body.
pub fn physics_system<S>(world: &mut World, chunks: &S, physics: &EntityPhysics, dt: f32)
where
    S: ChunkSource + ?Sized,
{
    let _span = trace_span!("physics_system").entered();
    for (_, (body, motion)) in world.query_mut::<(&mut PhysicsBody, &mut Motion)>() {
        body.step(physics, chunks, motion.translation, dt);
        motion.translation = Vec3::ZERO;
    }
}
