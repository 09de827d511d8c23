//! Streaming configuration and view-range computation.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cubeterra_core::constants::CHUNK_EXTENT;
use cubeterra_core::coords::ChunkPos;
use cubeterra_core::{Error, Result};
use glam::Vec3;

/// Largest accepted view distance, in world units.
pub const MAX_VIEW_DISTANCE: f32 = 512.0;

/// Configuration for chunk streaming behavior.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Radius around the viewer, in world units, within which chunk centers
    /// must be live.
    pub view_distance: f32,
    /// Number of generation worker threads.
    pub worker_threads: usize,
    /// Progress at which the manager reports itself ready.
    pub ready_threshold: f32,
    /// Membership events kept until drained.
    pub event_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map_or(1, |n| n.get().saturating_sub(1))
            .max(1);
        Self {
            view_distance: 96.0,
            worker_threads: workers,
            ready_threshold: 1.0,
            event_capacity: 4096,
        }
    }
}

impl StreamingConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        validate_view_distance(self.view_distance)?;
        if self.worker_threads == 0 {
            return Err(Error::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be at least 1".into(),
            ));
        }
        if !(self.ready_threshold > 0.0 && self.ready_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "ready_threshold {} outside (0, 1]",
                self.ready_threshold
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_view_distance(view_distance: f32) -> Result<()> {
    if (0.0..=MAX_VIEW_DISTANCE).contains(&view_distance) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "view distance {view_distance} outside [0, {MAX_VIEW_DISTANCE}]"
        )))
    }
}

/// Streaming state of a chunk coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Not wanted, or wanted but not yet requested.
    Absent,
    /// Generation requested, queued, running or awaiting retry.
    Pending,
    /// Generated and queryable.
    Live,
}

/// Membership change notification for consumers such as a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkEvent {
    /// The chunk became live.
    Loaded(ChunkPos),
    /// The chunk was evicted.
    Unloaded(ChunkPos),
}

/// Priority entry for chunk loading queue.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoadPriority {
    pub(crate) pos: ChunkPos,
    /// Squared distance to viewer (lower = higher priority).
    pub(crate) distance_sq: f32,
}

impl PartialEq for LoadPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LoadPriority {}

impl PartialOrd for LoadPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (closer chunks have higher priority)
        other.distance_sq.total_cmp(&self.distance_sq)
    }
}

/// Chunk coordinates whose centers lie within `view_distance` of `viewer`,
/// nearest first.
pub fn chunks_in_view(viewer: Vec3, view_distance: f32) -> Vec<ChunkPos> {
    let view_sq = view_distance * view_distance;
    // Centers within range can sit at most this many chunks from the viewer's
    let radius = (view_distance / CHUNK_EXTENT).ceil() as i32 + 1;

    let mut heap: BinaryHeap<LoadPriority> = ChunkPos::from_world(viewer)
        .neighborhood(radius)
        .filter_map(|pos| {
            let distance_sq = pos.center_distance_sq(viewer);
            (distance_sq <= view_sq).then_some(LoadPriority { pos, distance_sq })
        })
        .collect();

    let mut ordered = Vec::with_capacity(heap.len());
    while let Some(entry) = heap.pop() {
        ordered.push(entry.pos);
    }
    ordered
}
