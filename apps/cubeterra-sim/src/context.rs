//! Application context wiring the world, chunk streaming, entities and physics.

use std::sync::Arc;

use cubeterra_core::coords::WorldPos;
use cubeterra_entity::{physics_system, spawn_player, Entity, Motion, Player, World, PLAYER_SIZE};
use cubeterra_physics::{EntityPhysics, PhysicsBody, PhysicsConfig};
use cubeterra_world::{
    ChunkEvent, ChunkManager, ChunkManagerBuilder, NoiseTerrainGenerator, StreamingConfig,
    TerrainConfig,
};
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::SimParams;

/// Ticks between status lines while playing.
const REPORT_INTERVAL: u64 = 60;

/// Ticks between jumps while playing.
const JUMP_INTERVAL: u64 = 90;

/// Clearance left between the spawned player and the ground.
const SPAWN_CLEARANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the chunks around the spawn point.
    Loading,
    /// Player spawned and moving.
    Playing,
}

/// Owns every subsystem of the simulation.
pub struct AppContext {
    chunks: ChunkManager,
    physics: EntityPhysics,
    world: World,
    spawn: Vec3,
    view_distance: f32,
    phase: Phase,
    player: Option<Entity>,
    played: u64,
    loaded_events: u64,
    unloaded_events: u64,
}

impl AppContext {
    /// Build the generator, chunk manager and physics from the parameters.
    pub fn new(params: &SimParams) -> anyhow::Result<Self> {
        let terrain = TerrainConfig {
            seed: params.seed,
            ..Default::default()
        };
        let spawn = Vec3::new(8.5, terrain.world_height as f32 * 0.5, 8.5);
        let generator = Arc::new(NoiseTerrainGenerator::new(terrain)?);

        let mut streaming = StreamingConfig {
            view_distance: params.view_distance,
            ..Default::default()
        };
        if let Some(workers) = params.workers {
            streaming.worker_threads = workers;
        }
        let chunks = ChunkManagerBuilder::new()
            .config(streaming)
            .shared_generator(generator)
            .build()?;

        Ok(Self {
            chunks,
            physics: EntityPhysics::new(PhysicsConfig::default())?,
            world: World::new(),
            spawn,
            view_distance: params.view_distance,
            phase: Phase::Loading,
            player: None,
            played: 0,
            loaded_events: 0,
            unloaded_events: 0,
        })
    }

    /// Start streaming around the spawn point.
    pub fn start(&self) -> anyhow::Result<()> {
        self.chunks.start(self.spawn, self.view_distance)?;
        Ok(())
    }

    /// True until the initial chunks are live.
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Ticks simulated since loading finished.
    pub fn played_ticks(&self) -> u64 {
        self.played
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.count_events();
        match self.phase {
            Phase::Loading => self.tick_loading(),
            Phase::Playing => self.tick_playing(dt),
        }
    }

    fn tick_loading(&mut self) {
        if self.chunks.is_ready() {
            let position = self.surface_spawn();
            self.player = Some(spawn_player(&mut self.world, position));
            self.phase = Phase::Playing;
            info!(
                live = self.chunks.live_count(),
                %position,
                "loading complete, player spawned"
            );
            return;
        }

        // Nothing left in flight but not ready: some chunks failed
        if self.chunks.is_idle() && self.chunks.pending_count() > 0 {
            warn!(pending = self.chunks.pending_count(), "retrying failed chunks");
            self.chunks.refresh();
        }
        debug!(progress = self.chunks.progress(), "loading");
    }

    fn tick_playing(&mut self, dt: f32) {
        let Some(player) = self.player else {
            return;
        };

        if let Ok((controls, motion, body)) = self
            .world
            .query_one_mut::<(&Player, &mut Motion, &mut PhysicsBody)>(player)
        {
            controls.walk(motion, Vec3::X, dt);
            if self.played % JUMP_INTERVAL == 0 {
                controls.jump(body);
            }
        }

        physics_system(&mut self.world, &self.chunks, &self.physics, dt);
        self.played += 1;

        let Ok(body) = self.world.get::<&PhysicsBody>(player).map(|b| *b) else {
            return;
        };
        self.chunks.set_viewer_position(body.position);

        if self.played % REPORT_INTERVAL == 0 {
            info!(
                tick = self.played,
                position = %body.position,
                on_ground = body.on_ground,
                live = self.chunks.live_count(),
                pending = self.chunks.pending_count(),
                "player"
            );
        }
    }

    /// Highest open position above solid ground in the spawn column.
    fn surface_spawn(&self) -> Vec3 {
        let top = (self.spawn.y + self.view_distance).floor() as i64;
        let column = WorldPos::from(self.spawn);
        let ground = (0..=top).rev().find(|&y| {
            self.chunks
                .block_at(WorldPos::new(column.x, y, column.z))
                .is_some_and(|block| block.is_solid())
        });

        match ground {
            Some(y) => Vec3::new(
                self.spawn.x,
                (y + 1) as f32 + PLAYER_SIZE.y * 0.5 + SPAWN_CLEARANCE,
                self.spawn.z,
            ),
            None => self.spawn,
        }
    }

    fn count_events(&mut self) {
        for event in self.chunks.drain_events() {
            match event {
                ChunkEvent::Loaded(_) => self.loaded_events += 1,
                ChunkEvent::Unloaded(_) => self.unloaded_events += 1,
            }
        }
    }

    /// Log a summary of the run.
    pub fn report(&self) {
        info!(
            ticks = self.played,
            live = self.chunks.live_count(),
            loaded = self.loaded_events,
            unloaded = self.unloaded_events,
            failures = self.chunks.failure_count(),
            memory_kib = self.chunks.memory_usage() / 1024,
            "simulation finished"
        );
    }
}
