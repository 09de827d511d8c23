//! Streaming chunk manager.
//!
//! Tracks every chunk coordinate through `Absent -> Pending -> Live` and back.
//! Viewer updates compute the wanted set, evict live chunks that left it and
//! queue generation for coordinates that entered it. Generation runs on a
//! dedicated worker pool; all membership changes happen under one lock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use cubeterra_core::coords::{ChunkPos, WorldPos};
use cubeterra_core::math::Aabb;
use cubeterra_core::types::BlockType;
use cubeterra_core::{Error, Result};
use glam::Vec3;
use hashbrown::hash_map::Entry;
use hashbrown::{HashMap, HashSet};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::chunk::{overlapping_in, Chunk, ChunkSource};
use crate::generation::TerrainGenerator;
use crate::streaming::{
    chunks_in_view, validate_view_distance, ChunkEvent, ChunkState, StreamingConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskStatus {
    /// Submitted, not yet picked up by a worker.
    Queued,
    /// A worker is generating it.
    Generating,
    /// The last attempt panicked; resubmitted on the next evaluation.
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct PendingChunk {
    ticket: u64,
    status: TaskStatus,
}

impl PendingChunk {
    fn queued(ticket: u64) -> Self {
        Self {
            ticket,
            status: TaskStatus::Queued,
        }
    }
}

/// Membership maps. Only ever touched under `Shared::state`.
struct StreamState {
    viewer: Option<Vec3>,
    view_distance: f32,
    wanted: HashSet<ChunkPos>,
    live: HashMap<ChunkPos, Arc<Chunk>>,
    pending: HashMap<ChunkPos, PendingChunk>,
    next_ticket: u64,
    failures: u64,
    dropped_events: u64,
}

impl StreamState {
    fn in_flight(&self) -> usize {
        self.pending
            .values()
            .filter(|p| p.status != TaskStatus::Failed)
            .count()
    }

    fn progress(&self) -> f32 {
        if self.viewer.is_none() {
            return 0.0;
        }
        if self.wanted.is_empty() {
            return 1.0;
        }
        let live = self.live.keys().filter(|p| self.wanted.contains(*p)).count();
        live as f32 / self.wanted.len() as f32
    }

    /// Queue an event, dropping it if the consumer has fallen behind.
    fn emit(&mut self, events: &Sender<ChunkEvent>, event: ChunkEvent) {
        if let Err(TrySendError::Full(event)) = events.try_send(event) {
            self.dropped_events += 1;
            trace!(?event, dropped = self.dropped_events, "event queue full");
        }
    }

    fn state_of(&self, pos: ChunkPos) -> ChunkState {
        if self.live.contains_key(&pos) {
            ChunkState::Live
        } else if self.pending.contains_key(&pos) {
            ChunkState::Pending
        } else {
            ChunkState::Absent
        }
    }

    /// Recompute the wanted set from the current viewer snapshot.
    ///
    /// Returns the `(pos, ticket)` pairs to submit, nearest first.
    fn reevaluate(&mut self, events: &Sender<ChunkEvent>) -> Vec<(ChunkPos, u64)> {
        let Some(viewer) = self.viewer else {
            return Vec::new();
        };
        let in_view = chunks_in_view(viewer, self.view_distance);
        self.wanted = in_view.iter().copied().collect();

        let wanted = &self.wanted;
        let mut evicted = Vec::new();
        self.live.retain(|pos, _| {
            let keep = wanted.contains(pos);
            if !keep {
                evicted.push(*pos);
            }
            keep
        });
        // Running tasks finish and are discarded on arrival if still unwanted
        self.pending
            .retain(|pos, p| p.status == TaskStatus::Generating || wanted.contains(pos));

        for pos in evicted {
            debug!(?pos, "chunk evicted");
            self.emit(events, ChunkEvent::Unloaded(pos));
        }

        let mut tasks = Vec::new();
        for pos in in_view {
            if self.live.contains_key(&pos) {
                continue;
            }
            let ticket = self.next_ticket;
            let submit = match self.pending.entry(pos) {
                Entry::Vacant(slot) => {
                    slot.insert(PendingChunk::queued(ticket));
                    true
                }
                Entry::Occupied(mut slot) if slot.get().status == TaskStatus::Failed => {
                    *slot.get_mut() = PendingChunk::queued(ticket);
                    true
                }
                Entry::Occupied(_) => false,
            };
            if submit {
                self.next_ticket += 1;
                tasks.push((pos, ticket));
            }
        }
        tasks
    }
}

/// State shared between the manager and its generation tasks.
struct Shared {
    state: Mutex<StreamState>,
    /// Signalled whenever a task finishes or queued work is dropped.
    settled: Condvar,
    generator: Arc<dyn TerrainGenerator>,
    events: Sender<ChunkEvent>,
    shutdown: AtomicBool,
}

impl Shared {
    fn run_generation(&self, pos: ChunkPos, ticket: u64) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(entry) = state.pending.get_mut(&pos) else {
                return;
            };
            if entry.ticket != ticket || entry.status != TaskStatus::Queued {
                return;
            }
            if !state.wanted.contains(&pos) {
                state.pending.remove(&pos);
                drop(guard);
                self.settled.notify_all();
                return;
            }
            entry.status = TaskStatus::Generating;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            Chunk::generate(pos, self.generator.as_ref())
        }));

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let still_wanted = state.wanted.contains(&pos);
        match result {
            Ok(chunk) => {
                state.pending.remove(&pos);
                if still_wanted {
                    debug!(?pos, solid = chunk.solid_count(), "chunk live");
                    state.live.insert(pos, Arc::new(chunk));
                    state.emit(&self.events, ChunkEvent::Loaded(pos));
                    if state.live.len() == state.wanted.len() {
                        debug!(live = state.live.len(), "all wanted chunks live");
                    }
                } else {
                    debug!(?pos, "discarding stale chunk");
                }
            }
            Err(payload) => {
                state.failures += 1;
                if still_wanted {
                    if let Some(entry) = state.pending.get_mut(&pos) {
                        entry.status = TaskStatus::Failed;
                    }
                } else {
                    state.pending.remove(&pos);
                }
                let error = Error::Generation {
                    pos,
                    reason: panic_reason(payload.as_ref()),
                };
                warn!(%error, still_wanted, "chunk generation failed");
            }
        }
        drop(guard);
        self.settled.notify_all();
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owns the live chunk set and drives asynchronous generation around a viewer.
///
/// Every public operation returns immediately; only [`wait_idle`](Self::wait_idle)
/// blocks, and only up to its timeout.
pub struct ChunkManager {
    shared: Arc<Shared>,
    pool: rayon::ThreadPool,
    events: Receiver<ChunkEvent>,
    config: StreamingConfig,
}

impl ChunkManager {
    /// Create a manager with the given configuration and generator.
    pub fn new<G>(config: StreamingConfig, generator: G) -> Result<Self>
    where
        G: TerrainGenerator + 'static,
    {
        ChunkManagerBuilder::new()
            .config(config)
            .generator(generator)
            .build()
    }

    /// Get the streaming configuration.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Begin streaming around `viewer` with the given view distance.
    pub fn start(&self, viewer: Vec3, view_distance: f32) -> Result<()> {
        validate_view_distance(view_distance)?;
        if !viewer.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "viewer position {viewer} is not finite"
            )));
        }

        let (tasks, wanted) = {
            let mut state = self.shared.state.lock();
            state.viewer = Some(viewer);
            state.view_distance = view_distance;
            let tasks = state.reevaluate(&self.shared.events);
            (tasks, state.wanted.len())
        };
        info!(%viewer, view_distance, wanted, "chunk management started");
        self.submit(tasks);
        Ok(())
    }

    /// Move the viewer. Evicts chunks that left the view range and queues
    /// the ones that entered it. Non-finite positions are ignored.
    pub fn set_viewer_position(&self, viewer: Vec3) {
        if !viewer.is_finite() {
            warn!(%viewer, "ignoring non-finite viewer position");
            return;
        }
        let tasks = {
            let mut state = self.shared.state.lock();
            state.viewer = Some(viewer);
            state.reevaluate(&self.shared.events)
        };
        self.submit(tasks);
    }

    /// Change the view distance and re-evaluate around the current viewer.
    pub fn set_view_distance(&self, view_distance: f32) -> Result<()> {
        validate_view_distance(view_distance)?;
        let tasks = {
            let mut state = self.shared.state.lock();
            state.view_distance = view_distance;
            state.reevaluate(&self.shared.events)
        };
        self.submit(tasks);
        Ok(())
    }

    /// Re-evaluate around the current viewer, resubmitting failed chunks.
    pub fn refresh(&self) {
        let tasks = self.shared.state.lock().reevaluate(&self.shared.events);
        self.submit(tasks);
    }

    /// Spawn the tasks of a re-evaluation and wake idle waiters, since the
    /// re-evaluation may have dropped the last queued task.
    fn submit(&self, tasks: Vec<(ChunkPos, u64)>) {
        for (pos, ticket) in tasks {
            let shared = Arc::clone(&self.shared);
            self.pool.spawn(move || shared.run_generation(pos, ticket));
        }
        self.shared.settled.notify_all();
    }

    /// Fraction of wanted chunks that are live, in `[0, 1]`.
    ///
    /// Zero before streaming starts.
    pub fn progress(&self) -> f32 {
        self.shared.state.lock().progress()
    }

    /// True once progress reaches the configured threshold.
    pub fn is_ready(&self) -> bool {
        self.progress() >= self.config.ready_threshold
    }

    /// Current viewer position, if streaming has started.
    pub fn viewer(&self) -> Option<Vec3> {
        self.shared.state.lock().viewer
    }

    /// Current view distance.
    pub fn view_distance(&self) -> f32 {
        self.shared.state.lock().view_distance
    }

    /// Streaming state of a coordinate.
    pub fn state_of(&self, pos: ChunkPos) -> ChunkState {
        self.shared.state.lock().state_of(pos)
    }

    /// The live chunk at `pos`.
    pub fn chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        self.shared.state.lock().live.get(&pos).cloned()
    }

    /// The live chunk containing a world-space point.
    pub fn chunk_at(&self, point: Vec3) -> Option<Arc<Chunk>> {
        self.chunk(ChunkPos::from_world(point))
    }

    /// Block at a world position, `None` if its chunk is not live.
    pub fn block_at(&self, pos: WorldPos) -> Option<BlockType> {
        self.chunk(pos.chunk_pos())
            .and_then(|chunk| chunk.block_at(pos))
    }

    /// Positions of all live chunks.
    pub fn live_positions(&self) -> Vec<ChunkPos> {
        self.shared.state.lock().live.keys().copied().collect()
    }

    /// Number of live chunks.
    pub fn live_count(&self) -> usize {
        self.shared.state.lock().live.len()
    }

    /// Number of pending coordinates, including failed ones awaiting retry.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Total generation failures since creation.
    pub fn failure_count(&self) -> u64 {
        self.shared.state.lock().failures
    }

    /// Events dropped because the event queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.state.lock().dropped_events
    }

    /// Approximate memory held by live chunks, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.shared
            .state
            .lock()
            .live
            .values()
            .map(|c| c.memory_usage())
            .sum()
    }

    /// True when no generation task is queued or running.
    pub fn is_idle(&self) -> bool {
        self.shared.state.lock().in_flight() == 0
    }

    /// Block until no generation task is queued or running, or `timeout`
    /// elapses. Returns whether the manager settled.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.in_flight() > 0 {
            if self.shared.settled.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight() == 0;
            }
        }
        true
    }

    /// Take every queued membership event.
    ///
    /// The queue holds at most [`StreamingConfig::event_capacity`] events;
    /// newer ones are dropped until it is drained.
    pub fn drain_events(&self) -> Vec<ChunkEvent> {
        self.events.try_iter().collect()
    }
}

impl ChunkSource for ChunkManager {
    fn chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        ChunkManager::chunk(self, pos)
    }

    fn chunks_around(&self, center: ChunkPos, radius: i32) -> Vec<Arc<Chunk>> {
        let state = self.shared.state.lock();
        center
            .neighborhood(radius)
            .filter_map(|pos| state.live.get(&pos).cloned())
            .collect()
    }

    fn chunks_overlapping(&self, bounds: &Aabb) -> Vec<Arc<Chunk>> {
        overlapping_in(&self.shared.state.lock().live, bounds)
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ChunkManager")
            .field("viewer", &state.viewer)
            .field("view_distance", &state.view_distance)
            .field("live", &state.live.len())
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ChunkManager`].
#[derive(Default)]
pub struct ChunkManagerBuilder {
    config: StreamingConfig,
    generator: Option<Arc<dyn TerrainGenerator>>,
}

impl ChunkManagerBuilder {
    /// Create a builder with default configuration and no generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the streaming configuration.
    #[must_use]
    pub fn config(mut self, config: StreamingConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the terrain generator.
    #[must_use]
    pub fn generator<G>(self, generator: G) -> Self
    where
        G: TerrainGenerator + 'static,
    {
        self.shared_generator(Arc::new(generator))
    }

    /// Set a terrain generator that is also used elsewhere.
    #[must_use]
    pub fn shared_generator(mut self, generator: Arc<dyn TerrainGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the manager and its worker pool.
    pub fn build(self) -> Result<ChunkManager> {
        self.config.validate()?;
        let generator = self.generator.ok_or(Error::Missing("terrain generator"))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|i| format!("chunk-worker-{i}"))
            .build()
            .map_err(|e| Error::Worker(e.to_string()))?;

        let (tx, rx) = channel::bounded(self.config.event_capacity);
        let state = StreamState {
            viewer: None,
            view_distance: self.config.view_distance,
            wanted: HashSet::new(),
            live: HashMap::new(),
            pending: HashMap::new(),
            next_ticket: 0,
            failures: 0,
            dropped_events: 0,
        };

        debug!(workers = self.config.worker_threads, "chunk worker pool ready");
        Ok(ChunkManager {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                settled: Condvar::new(),
                generator,
                events: tx,
                shutdown: AtomicBool::new(false),
            }),
            pool,
            events: rx,
            config: self.config,
        })
    }
}
