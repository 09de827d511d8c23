//! Per-tick collision resolution against streamed chunks.

use std::sync::Arc;

use cubeterra_core::constants::CHUNK_EXTENT;
use cubeterra_core::math::{Aabb, Axis, Ray};
use cubeterra_core::{Error, Result};
use cubeterra_world::{Chunk, ChunkSource};
use glam::Vec3;
use tracing::trace;

use crate::body::{PhysicsBody, Resolution};
use crate::HasBounds;

/// Largest gap between neighbouring probe rays. Below one voxel, so no solid
/// voxel can slip between two rays.
const MAX_RAY_SPACING: f32 = 0.5;

/// Largest body extent along any axis. Bounds the rays cast per face.
pub const MAX_BODY_EXTENT: f32 = CHUNK_EXTENT;

/// Physics tuning.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Vertical acceleration in world units per second squared, negative down.
    pub gravity: f32,
    /// Maximum falling speed.
    pub terminal_velocity: f32,
    /// Gap kept between a body and any surface it is stopped by.
    pub collision_buffer: f32,
    /// Apply gravity to vertical velocity.
    pub gravity_enabled: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -25.0,
            terminal_velocity: 50.0,
            collision_buffer: 0.005,
            gravity_enabled: true,
        }
    }
}

impl PhysicsConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(Error::InvalidConfig("gravity must be finite".into()));
        }
        if !(self.terminal_velocity.is_finite() && self.terminal_velocity > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "terminal_velocity must be positive, got {}",
                self.terminal_velocity
            )));
        }
        if !(self.collision_buffer > 0.0 && self.collision_buffer < MAX_RAY_SPACING * 0.5) {
            return Err(Error::InvalidConfig(format!(
                "collision_buffer {} outside (0, {})",
                self.collision_buffer,
                MAX_RAY_SPACING * 0.5
            )));
        }
        Ok(())
    }
}

/// Resolves body movement against the solid voxels of nearby chunks.
#[derive(Debug, Clone, Default)]
pub struct EntityPhysics {
    config: PhysicsConfig,
}

impl EntityPhysics {
    /// Create a resolver with the given configuration.
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the physics configuration.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Compute the translation `body` may actually make this tick.
    ///
    /// Gravity is applied first and the vertical move is resolved before the
    /// horizontal ones, so the X and Z probes are built at the new height.
    /// Non-finite components of `proposed` are ignored. Chunks that are not
    /// available contribute no collisions. Every chunk the swept box reaches is
    /// consulted, however long the move. Bodies that are not finite, or larger
    /// than [`MAX_BODY_EXTENT`], do not move.
    pub fn resolve_translation<S>(
        &self,
        chunks: &S,
        body: &PhysicsBody,
        proposed: Vec3,
        dt: f32,
    ) -> Resolution
    where
        S: ChunkSource + ?Sized,
    {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut on_ground = body.on_ground;
        let mut velocity = if body.velocity_y.is_finite() {
            body.velocity_y
        } else {
            0.0
        };

        let usable_size = body.size.is_finite()
            && body.size.cmpge(Vec3::ZERO).all()
            && body.size.cmple(Vec3::splat(MAX_BODY_EXTENT)).all();
        if !body.position.is_finite() || !usable_size {
            return Resolution {
                translation: Vec3::ZERO,
                on_ground,
                vertical_velocity: 0.0,
            };
        }

        if self.config.gravity_enabled {
            velocity = (velocity + self.config.gravity * dt).max(-self.config.terminal_velocity);
        }
        let mut translation = Vec3::new(
            finite_or_zero(proposed.x),
            finite_or_zero(proposed.y) + velocity * dt,
            finite_or_zero(proposed.z),
        );

        let bounds = body.bounds();
        let buffer = self.config.collision_buffer;

        let dy = translation.y;
        if dy != 0.0 {
            let sweep = bounds.swept(Axis::Y, dy + dy.signum() * buffer);
            let nearby = chunks.chunks_overlapping(&sweep);
            match self.clamp_along(&nearby, &bounds, Axis::Y, dy) {
                Some(allowed) => {
                    translation.y = allowed;
                    velocity = 0.0;
                    if dy < 0.0 {
                        on_ground = true;
                    }
                }
                None => on_ground = false,
            }
        }

        let mut moved = bounds.translated(Vec3::new(0.0, translation.y, 0.0));
        for axis in [Axis::X, Axis::Z] {
            let i = axis.index();
            let distance = translation[i];
            if distance == 0.0 {
                continue;
            }
            let probe = moved.swept(axis, distance + distance.signum() * buffer);
            let nearby = chunks.chunks_overlapping(&probe);
            if nearby.iter().any(|chunk| chunk.collides(&probe)) {
                if let Some(allowed) = self.clamp_along(&nearby, &moved, axis, distance) {
                    translation[i] = allowed;
                }
            }
            moved = moved.translated(axis.unit() * translation[i]);
        }

        Resolution {
            translation,
            on_ground,
            vertical_velocity: velocity,
        }
    }

    /// Cast rays from the face of `bounds` leading along `axis` and return the
    /// shortened distance if anything solid is closer than `distance`.
    fn clamp_along(
        &self,
        nearby: &[Arc<Chunk>],
        bounds: &Aabb,
        axis: Axis,
        distance: f32,
    ) -> Option<f32> {
        let sign = distance.signum();
        let i = axis.index();
        let face = if sign < 0.0 { bounds.min[i] } else { bounds.max[i] };
        let (u, v) = axis.others();
        let (u, v) = (u.index(), v.index());
        let buffer = self.config.collision_buffer;

        // Rays are inset from the edges so an edge flush with a voxel still hits
        let nearest = sample_offsets(bounds.min[u], bounds.max[u], buffer)
            .flat_map(|a| {
                sample_offsets(bounds.min[v], bounds.max[v], buffer).map(move |b| (a, b))
            })
            .filter_map(|(a, b)| {
                let mut origin = Vec3::ZERO;
                origin[i] = face;
                origin[u] = a;
                origin[v] = b;
                nearest_hit(nearby, &Ray::along(origin, axis, sign))
            })
            .min_by(f32::total_cmp)?;

        let allowed = (nearest - buffer).max(0.0);
        if allowed < distance.abs() {
            trace!(?axis, requested = distance, allowed, "translation clamped");
            Some(sign * allowed)
        } else {
            None
        }
    }
}

#[inline]
fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn nearest_hit(nearby: &[Arc<Chunk>], ray: &Ray) -> Option<f32> {
    nearby
        .iter()
        .filter_map(|chunk| chunk.nearest_intersection(ray))
        .min_by(f32::total_cmp)
}

/// Evenly spaced positions across `[min + inset, max - inset]`, both ends
/// included, at most `MAX_RAY_SPACING` apart.
fn sample_offsets(min: f32, max: f32, inset: f32) -> impl Iterator<Item = f32> {
    let (lo, hi) = if max - min > 2.0 * inset {
        (min + inset, max - inset)
    } else {
        let mid = (min + max) * 0.5;
        (mid, mid)
    };
    let steps = ((hi - lo) / MAX_RAY_SPACING).ceil().max(1.0) as u32;
    (0..=steps).map(move |i| lo + (hi - lo) * i as f32 / steps as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cubeterra_core::coords::{ChunkPos, WorldPos};
    use cubeterra_core::types::BlockType;
    use hashbrown::HashMap;

    const PLAYER: Vec3 = Vec3::new(0.6, 1.8, 0.6);

    type ChunkMap = HashMap<ChunkPos, Arc<Chunk>>;

    fn world<F>(generator: F) -> ChunkMap
    where
        F: Fn(WorldPos) -> BlockType + Send + Sync,
    {
        ChunkPos::new(0, 0, 0)
            .neighborhood(1)
            .map(|pos| (pos, Arc::new(Chunk::generate(pos, &generator))))
            .collect()
    }

    fn floor(pos: WorldPos) -> BlockType {
        match pos.y {
            0 => BlockType::Bedrock,
            1..=3 => BlockType::Stone,
            _ => BlockType::Air,
        }
    }

    fn no_gravity() -> EntityPhysics {
        EntityPhysics::new(PhysicsConfig {
            gravity_enabled: false,
            ..Default::default()
        })
        .expect("valid config")
    }

    fn standing(x: f32, z: f32) -> PhysicsBody {
        let mut body = PhysicsBody::new(Vec3::new(x, 4.905, z), PLAYER);
        body.on_ground = true;
        body
    }

    #[test]
    fn falling_body_never_tunnels() {
        let chunks = world(floor);
        let physics = EntityPhysics::default();
        let mut body = PhysicsBody::new(Vec3::new(5.5, 20.0, 5.5), PLAYER);
        body.velocity_y = -1000.0;

        let resolution = physics.resolve_translation(&chunks, &body, Vec3::ZERO, 0.5);
        assert_relative_eq!(resolution.translation.y, -15.095, epsilon = 1e-3);
        assert!(resolution.on_ground);
        assert_eq!(resolution.vertical_velocity, 0.0);

        body.apply(&resolution);
        assert!(body.bounds().min.y >= 4.0);

        // Arbitrarily large requested translation
        let body = PhysicsBody::new(Vec3::new(5.5, 20.0, 5.5), PLAYER);
        let resolution =
            no_gravity().resolve_translation(&chunks, &body, Vec3::new(0.0, -1.0e6, 0.0), 0.016);
        assert!(body.bounds().min.y + resolution.translation.y >= 4.0);
        assert!(resolution.on_ground);
    }

    #[test]
    fn long_falls_reach_chunks_beyond_the_neighbourhood() {
        let chunks = world(floor);

        // Three chunks above the floor chunk, moved far past it in one call
        let body = PhysicsBody::new(Vec3::new(5.5, 100.0, 5.5), PLAYER);
        let resolution =
            no_gravity().resolve_translation(&chunks, &body, Vec3::new(0.0, -1000.0, 0.0), 0.016);
        assert!(resolution.on_ground);
        assert_relative_eq!(resolution.translation.y, -95.095, epsilon = 1e-3);
        assert!(body.bounds().min.y + resolution.translation.y >= 4.0);

        // Terminal velocity over a long tick
        let mut body = PhysicsBody::new(Vec3::new(5.5, 66.0, 5.5), PLAYER);
        body.velocity_y = -50.0;
        let resolution =
            EntityPhysics::default().resolve_translation(&chunks, &body, Vec3::ZERO, 2.0);
        assert!(resolution.on_ground);
        assert_relative_eq!(resolution.translation.y, -61.095, epsilon = 1e-3);
        body.apply(&resolution);
        assert!(body.bounds().min.y >= 4.0);
    }

    #[test]
    fn long_walks_stop_at_distant_walls() {
        let wall = |pos: WorldPos| {
            if pos.x == 100 && (4..=9).contains(&pos.y) {
                BlockType::Stone
            } else {
                floor(pos)
            }
        };
        let mut chunks = world(wall);
        for x in 2..=3 {
            let pos = ChunkPos::new(x, 0, 0);
            chunks.insert(pos, Arc::new(Chunk::generate(pos, &wall)));
        }

        let body = standing(5.5, 5.5);
        let resolution = EntityPhysics::default().resolve_translation(
            &chunks,
            &body,
            Vec3::new(200.0, 0.0, 0.0),
            0.016,
        );
        assert_relative_eq!(resolution.translation.x, 94.195, epsilon = 1e-3);
        assert!(body.bounds().max.x + resolution.translation.x < 100.0);
    }

    #[test]
    fn oversized_bodies_do_not_move() {
        let chunks = world(floor);
        let physics = EntityPhysics::default();
        let mut body = PhysicsBody::new(Vec3::new(5.5, 20.0, 5.5), Vec3::new(1.0e6, 1.0, 1.0));
        body.velocity_y = -3.0;

        let resolution =
            physics.resolve_translation(&chunks, &body, Vec3::new(1.0, -1.0, 0.0), 0.1);
        assert_eq!(resolution.translation, Vec3::ZERO);
        assert_eq!(resolution.vertical_velocity, 0.0);

        body.size = Vec3::new(-1.0, 1.0, 1.0);
        let resolution =
            physics.resolve_translation(&chunks, &body, Vec3::new(1.0, -1.0, 0.0), 0.1);
        assert_eq!(resolution.translation, Vec3::ZERO);

        body.size = Vec3::splat(MAX_BODY_EXTENT);
        let resolution =
            physics.resolve_translation(&chunks, &body, Vec3::new(1.0, 0.0, 0.0), 0.1);
        assert_ne!(resolution.translation, Vec3::ZERO);
    }

    #[test]
    fn terminal_velocity_caps_fall() {
        let physics = EntityPhysics::default();
        let mut body = PhysicsBody::new(Vec3::new(5.5, 200.0, 5.5), PLAYER);
        body.velocity_y = -49.0;
        let resolution = physics.resolve_translation(&ChunkMap::new(), &body, Vec3::ZERO, 1.0);
        assert_relative_eq!(resolution.vertical_velocity, -50.0);
        assert_relative_eq!(resolution.translation.y, -50.0);
        assert!(!resolution.on_ground);
    }

    #[test]
    fn nan_axis_is_left_unmodified() {
        let chunks = world(floor);
        let physics = EntityPhysics::default();
        let body = standing(5.5, 5.5);

        let resolution =
            physics.resolve_translation(&chunks, &body, Vec3::new(f32::NAN, 0.0, 0.5), 0.05);
        assert_eq!(resolution.translation.x, 0.0);
        assert_relative_eq!(resolution.translation.z, 0.5);
        assert!(resolution.translation.y.abs() < 1e-4);
        assert!(resolution.on_ground);
        assert!(resolution.translation.is_finite());
    }

    #[test]
    fn wall_clamps_horizontal_move() {
        let chunks = world(|pos: WorldPos| {
            if pos.x == 8 && (4..=9).contains(&pos.y) {
                BlockType::Stone
            } else {
                floor(pos)
            }
        });
        let physics = EntityPhysics::default();
        let body = standing(5.5, 5.5);

        let toward = physics.resolve_translation(&chunks, &body, Vec3::new(5.0, 0.0, 0.0), 0.016);
        assert_relative_eq!(toward.translation.x, 2.195, epsilon = 1e-3);
        assert!(body.bounds().max.x + toward.translation.x < 8.0);

        let away = physics.resolve_translation(&chunks, &body, Vec3::new(-2.0, 0.0, 0.0), 0.016);
        assert_relative_eq!(away.translation.x, -2.0);
    }

    #[test]
    fn diagonal_move_slides_along_wall() {
        let chunks = world(|pos: WorldPos| {
            if pos.x == 8 && (4..=9).contains(&pos.y) {
                BlockType::Stone
            } else {
                floor(pos)
            }
        });
        let physics = EntityPhysics::default();
        let body = standing(7.5, 5.5);

        let resolution =
            physics.resolve_translation(&chunks, &body, Vec3::new(1.0, 0.0, 1.0), 0.016);
        assert!(resolution.translation.x < 0.2);
        assert_relative_eq!(resolution.translation.z, 1.0);
    }

    #[test]
    fn ungenerated_chunks_do_not_collide() {
        let body = PhysicsBody::new(Vec3::new(5.5, 5.0, 5.5), PLAYER);
        let proposed = Vec3::new(3.0, -2.0, 1.0);
        let resolution = no_gravity().resolve_translation(&ChunkMap::new(), &body, proposed, 0.1);
        assert_eq!(resolution.translation, proposed);
        assert!(!resolution.on_ground);
    }

    #[test]
    fn corner_overlap_still_lands() {
        let column = |pos: WorldPos| {
            if pos.x == 6 && (0..=3).contains(&pos.y) {
                BlockType::Stone
            } else {
                BlockType::Air
            }
        };
        let chunks = world(column);
        let physics = no_gravity();
        let drop = Vec3::new(0.0, -10.0, 0.0);

        // Spans x in [5.5, 6.1], overlapping the column by a sliver
        let over = PhysicsBody::new(Vec3::new(5.8, 10.0, 5.5), PLAYER);
        let resolution = physics.resolve_translation(&chunks, &over, drop, 0.1);
        assert!(resolution.on_ground);
        assert_relative_eq!(resolution.translation.y, -5.095, epsilon = 1e-3);

        // Spans x in [5.3, 5.9], clear of it
        let beside = PhysicsBody::new(Vec3::new(5.6, 10.0, 5.5), PLAYER);
        let resolution = physics.resolve_translation(&chunks, &beside, drop, 0.1);
        assert!(!resolution.on_ground);
        assert_relative_eq!(resolution.translation.y, -10.0);
    }

    #[test]
    fn ceiling_stops_jump() {
        let chunks = world(|pos: WorldPos| {
            if pos.y == 12 {
                BlockType::Stone
            } else {
                floor(pos)
            }
        });
        let physics = EntityPhysics::default();
        let mut body = PhysicsBody::new(Vec3::new(5.5, 9.0, 5.5), PLAYER);
        body.velocity_y = 30.0;

        let resolution = physics.resolve_translation(&chunks, &body, Vec3::ZERO, 0.1);
        assert_relative_eq!(resolution.translation.y, 2.095, epsilon = 1e-3);
        assert_eq!(resolution.vertical_velocity, 0.0);
        assert!(!resolution.on_ground);
    }

    #[test]
    fn resting_body_stays_grounded() {
        let chunks = world(floor);
        let physics = EntityPhysics::default();
        let mut body = standing(5.5, 5.5);
        let start = body.position;

        for _ in 0..30 {
            body.step(&physics, &chunks, Vec3::ZERO, 1.0 / 60.0);
            assert!(body.on_ground);
        }
        assert!((body.position.y - start.y).abs() < 1e-3);
        assert_eq!(body.velocity_y, 0.0);
    }

    #[test]
    fn walking_off_a_ledge_clears_on_ground() {
        let body = standing(5.5, 5.5);
        let resolution =
            EntityPhysics::default().resolve_translation(&ChunkMap::new(), &body, Vec3::ZERO, 0.1);
        assert!(!resolution.on_ground);
        assert!(resolution.translation.y < 0.0);
    }

    #[test]
    fn sample_offsets_cover_span() {
        let samples: Vec<f32> = sample_offsets(0.0, 1.8, 0.005).collect();
        assert_relative_eq!(samples[0], 0.005, epsilon = 1e-6);
        assert_relative_eq!(*samples.last().expect("samples"), 1.795, epsilon = 1e-6);
        assert!(samples.windows(2).all(|w| w[1] - w[0] <= MAX_RAY_SPACING + 1e-6));

        let thin: Vec<f32> = sample_offsets(1.0, 1.004, 0.005).collect();
        assert!(thin.iter().all(|&s| (s - 1.002).abs() < 1e-6));
    }

    #[test]
    fn config_validation() {
        assert!(PhysicsConfig::default().validate().is_ok());
        let bad = PhysicsConfig {
            collision_buffer: 0.0,
            ..Default::default()
        };
        assert!(EntityPhysics::new(bad).is_err());
        let bad = PhysicsConfig {
            terminal_velocity: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
