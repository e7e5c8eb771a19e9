//! # Streaming Scheduler
//!
//! Decides which chunks to load and evict around a viewer.
//!
//! ## Design
//!
//! ```text
//!   queue_chunks_around ──► [ pending queue ] ──process_load_queue──► job channel
//!        (nearest first)        (dedup set)      (≤ MAX_IN_FLIGHT)        │
//!                                                                        ▼
//!   WorldStore ◄──poll_completed── result channel ◄── worker: storage, else generate
//! ```
//!
//! - Loads run on worker threads; a result is only merged by a later
//!   `poll_completed`, never inside `process_load_queue`.
//! - A failed load releases its slot. The coordinate is forgotten and a
//!   later `queue_chunks_around` may enqueue it again.
//! - Eviction saves dirty chunks first. A chunk whose save fails stays
//!   resident.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use terra_shared::ChunkCoord;

use crate::chunk::Chunk;
use crate::generator::TerrainGenerator;
use crate::persistence::{load_chunk, save_chunk, KeyValueStore, StorageError};
use crate::store::WorldStore;

/// Loads allowed in flight at once.
pub const MAX_IN_FLIGHT_LOADS: usize = 2;

/// Outcome of one background load.
type LoadOutcome = (ChunkCoord, Result<Chunk, StorageError>);

/// Scheduler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Loads handed to workers.
    pub dispatched: u64,
    /// Loads merged into the store.
    pub completed: u64,
    /// Loads that failed.
    pub failed: u64,
    /// Chunks evicted.
    pub evicted: u64,
    /// Chunks written to storage.
    pub saved: u64,
}

/// Result of a [`StreamingScheduler::poll_completed`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Chunks merged into the store.
    pub loaded: usize,
    /// Loads that failed and released their slot.
    pub failed: usize,
}

/// Result of an eviction or flush pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Chunks persisted.
    pub saved: usize,
    /// Chunks removed from the store.
    pub evicted: usize,
    /// Chunks whose save failed (still resident and dirty).
    pub failed: Vec<ChunkCoord>,
}

struct PendingLoad {
    coord: ChunkCoord,
    seq: u64,
}

/// Distance-prioritized chunk loader with bounded concurrency.
pub struct StreamingScheduler {
    pending: Vec<PendingLoad>,
    queued: HashSet<ChunkCoord>,
    in_flight: HashSet<ChunkCoord>,
    next_seq: u64,
    max_in_flight: usize,
    storage: Arc<dyn KeyValueStore>,
    job_tx: Option<Sender<ChunkCoord>>,
    result_rx: Receiver<LoadOutcome>,
    workers: Vec<JoinHandle<()>>,
    stats: SchedulerStats,
}

impl StreamingScheduler {
    /// Creates a scheduler with [`MAX_IN_FLIGHT_LOADS`] workers.
    #[must_use]
    pub fn new(generator: TerrainGenerator, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limit(generator, storage, MAX_IN_FLIGHT_LOADS)
    }

    /// Creates a scheduler with a custom concurrency limit (at least 1).
    #[must_use]
    pub fn with_limit(
        generator: TerrainGenerator,
        storage: Arc<dyn KeyValueStore>,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        let (job_tx, job_rx) = unbounded::<ChunkCoord>();
        let (result_tx, result_rx) = unbounded::<LoadOutcome>();

        let workers = (0..max_in_flight)
            .map(|_| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || {
                    for coord in &jobs {
                        let outcome = load_or_generate(storage.as_ref(), &generator, coord);
                        if results.send((coord, outcome)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            pending: Vec::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            next_seq: 0,
            max_in_flight,
            storage,
            job_tx: Some(job_tx),
            result_rx,
            workers,
            stats: SchedulerStats::default(),
        }
    }

    /// Concurrency limit.
    #[inline]
    #[must_use]
    pub const fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Loads currently running.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a coordinate is queued or loading.
    #[must_use]
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.queued.contains(&coord) || self.in_flight.contains(&coord)
    }

    /// Queued coordinates in dispatch order.
    #[must_use]
    pub fn queued(&self) -> Vec<ChunkCoord> {
        self.pending.iter().map(|p| p.coord).collect()
    }

    /// Counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// The backing store.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Enqueues every missing chunk within `radius` chunks (square) of the
    /// viewer's world position, then reorders the whole queue nearest-first.
    ///
    /// Coordinates already resident, queued or in flight are skipped.
    /// Returns how many coordinates were added.
    pub fn queue_chunks_around(&mut self, store: &WorldStore, x: f32, z: f32, radius: i32) -> usize {
        let center = ChunkCoord::from_position(x, z);
        let radius = radius.max(0);
        let mut added = 0;

        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.z + dz);
                if store.contains(coord) || self.is_pending(coord) {
                    continue;
                }
                self.queued.insert(coord);
                self.pending.push(PendingLoad { coord, seq: self.next_seq });
                self.next_seq += 1;
                added += 1;
            }
        }

        self.pending
            .sort_by_key(|p| (p.coord.distance_squared(center), p.seq));
        if added > 0 {
            trace!(%center, added, queued = self.pending.len(), "queued chunk loads");
        }
        added
    }

    /// Dispatches queued loads while fewer than the limit are in flight.
    ///
    /// Returns how many loads were started.
    pub fn process_load_queue(&mut self) -> usize {
        let Some(job_tx) = self.job_tx.as_ref() else {
            return 0;
        };
        let mut started = 0;
        while self.in_flight.len() < self.max_in_flight && !self.pending.is_empty() {
            let next = self.pending.remove(0);
            if job_tx.send(next.coord).is_err() {
                warn!("chunk workers are gone; loads stay queued");
                self.pending.insert(0, next);
                break;
            }
            self.queued.remove(&next.coord);
            self.in_flight.insert(next.coord);
            self.stats.dispatched += 1;
            started += 1;
        }
        started
    }

    /// Merges finished loads into the store without blocking.
    pub fn poll_completed(&mut self, store: &mut WorldStore) -> PollSummary {
        let mut summary = PollSummary::default();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.merge(store, outcome, &mut summary);
        }
        summary
    }

    /// Like [`poll_completed`](Self::poll_completed), but waits up to
    /// `timeout` for the first result when loads are in flight.
    pub fn wait_completed(&mut self, store: &mut WorldStore, timeout: Duration) -> PollSummary {
        let mut summary = PollSummary::default();
        if self.in_flight.is_empty() {
            return summary;
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok(outcome) => self.merge(store, outcome, &mut summary),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return summary,
        }
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.merge(store, outcome, &mut summary);
        }
        summary
    }

    fn merge(&mut self, store: &mut WorldStore, (coord, result): LoadOutcome, summary: &mut PollSummary) {
        self.in_flight.remove(&coord);
        match result {
            Ok(chunk) => {
                // A chunk that became resident some other way keeps its edits.
                if !store.contains(coord) {
                    store.insert_chunk(chunk);
                }
                self.stats.completed += 1;
                summary.loaded += 1;
            }
            Err(e) => {
                warn!(%coord, error = %e, "chunk load failed");
                self.stats.failed += 1;
                summary.failed += 1;
            }
        }
    }

    /// Evicts resident chunks more than `radius` chunks (square) from the
    /// viewer. Dirty chunks are saved first; a failed save keeps the chunk.
    /// Queued loads outside the radius are dropped.
    pub fn unload_far_chunks(&mut self, store: &mut WorldStore, x: f32, z: f32, radius: i32) -> FlushReport {
        let center = ChunkCoord::from_position(x, z);
        let far: Vec<ChunkCoord> = store
            .coords()
            .filter(|c| c.ring_distance(center) > radius)
            .collect();
        let mut report = evict_chunks(self.storage.as_ref(), store, &far);

        let before = self.pending.len();
        self.pending.retain(|p| p.coord.ring_distance(center) <= radius);
        if self.pending.len() != before {
            self.queued = self.pending.iter().map(|p| p.coord).collect();
        }

        self.stats.saved += report.saved as u64;
        self.stats.evicted += report.evicted as u64;
        if report.evicted > 0 {
            debug!(%center, evicted = report.evicted, saved = report.saved, "unloaded far chunks");
        }
        report.failed.sort();
        report
    }

    /// Saves every dirty resident chunk.
    pub fn flush_dirty_chunks(&mut self, store: &mut WorldStore) -> FlushReport {
        let report = flush_dirty(self.storage.as_ref(), store);
        self.stats.saved += report.saved as u64;
        report
    }
}

impl Drop for StreamingScheduler {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loops.
        self.job_tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Storage first, generation as the fallback.
fn load_or_generate(
    storage: &dyn KeyValueStore,
    generator: &TerrainGenerator,
    coord: ChunkCoord,
) -> Result<Chunk, StorageError> {
    Ok(load_chunk(storage, coord)?.unwrap_or_else(|| generator.generate(coord)))
}

/// Saves every dirty chunk in `store`, clearing the flag on success.
pub fn flush_dirty(storage: &dyn KeyValueStore, store: &mut WorldStore) -> FlushReport {
    let mut report = FlushReport::default();
    for chunk in store.iter_mut().filter(|c| c.dirty) {
        match save_chunk(storage, chunk) {
            Ok(()) => {
                chunk.dirty = false;
                report.saved += 1;
            }
            Err(e) => {
                warn!(coord = %chunk.coord, error = %e, "chunk save failed");
                report.failed.push(chunk.coord);
            }
        }
    }
    report
}

/// Removes the given chunks, saving dirty ones first.
pub fn evict_chunks(storage: &dyn KeyValueStore, store: &mut WorldStore, coords: &[ChunkCoord]) -> FlushReport {
    let mut report = FlushReport::default();
    for &coord in coords {
        let Some(chunk) = store.chunk_mut(coord) else {
            continue;
        };
        if chunk.dirty {
            if let Err(e) = save_chunk(storage, chunk) {
                warn!(%coord, error = %e, "keeping dirty chunk after failed save");
                report.failed.push(coord);
                continue;
            }
            chunk.dirty = false;
            report.saved += 1;
        }
        store.remove_chunk(coord);
        report.evicted += 1;
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::WorldSeed;
    use crate::persistence::{MemoryStore, StorageResult};
    use terra_shared::Block;

    fn scheduler(storage: Arc<dyn KeyValueStore>) -> StreamingScheduler {
        StreamingScheduler::new(TerrainGenerator::new(WorldSeed::new(42)), storage)
    }

    fn drain(scheduler: &mut StreamingScheduler, store: &mut WorldStore) {
        while scheduler.in_flight() > 0 || !scheduler.queued().is_empty() {
            scheduler.process_load_queue();
            assert!(scheduler.in_flight() <= MAX_IN_FLIGHT_LOADS);
            scheduler.wait_completed(store, Duration::from_secs(5));
        }
    }

    #[test]
    fn test_queue_is_nearest_first() {
        let store = WorldStore::new();
        let mut s = scheduler(Arc::new(MemoryStore::new()));
        assert_eq!(s.queue_chunks_around(&store, 8.0, 8.0, 2), 25);

        let queued = s.queued();
        assert_eq!(queued[0], ChunkCoord::new(0, 0));
        let center = ChunkCoord::new(0, 0);
        for pair in queued.windows(2) {
            assert!(pair[0].distance_squared(center) <= pair[1].distance_squared(center));
        }
        // Ties keep enqueue order (row-major from -radius).
        assert_eq!(&queued[1..5], &[
            ChunkCoord::new(0, -1),
            ChunkCoord::new(-1, 0),
            ChunkCoord::new(1, 0),
            ChunkCoord::new(0, 1),
        ]);
    }

    #[test]
    fn test_no_duplicate_enqueue() {
        let mut store = WorldStore::new();
        store.insert_chunk(Chunk::new(ChunkCoord::new(0, 0)));
        let mut s = scheduler(Arc::new(MemoryStore::new()));

        assert_eq!(s.queue_chunks_around(&store, 0.0, 0.0, 1), 8);
        assert_eq!(s.queue_chunks_around(&store, 0.0, 0.0, 1), 0);

        s.process_load_queue();
        assert_eq!(s.in_flight(), 2);
        // In-flight coordinates are not re-queued either.
        assert_eq!(s.queue_chunks_around(&store, 0.0, 0.0, 1), 0);
        assert!(!s.queued().contains(&ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_completion_is_deferred_and_bounded() {
        let mut store = WorldStore::new();
        let mut s = scheduler(Arc::new(MemoryStore::new()));
        s.queue_chunks_around(&store, 0.0, 0.0, 2);

        assert_eq!(s.process_load_queue(), 2);
        assert_eq!(s.process_load_queue(), 0);
        assert!(store.is_empty(), "loads must not land before poll_completed");

        drain(&mut s, &mut store);
        assert_eq!(store.len(), 25);
        assert_eq!(s.stats().completed, 25);
    }

    #[test]
    fn test_loaded_chunk_marks_neighbors() {
        let mut store = WorldStore::new();
        store.insert_chunk(Chunk::new(ChunkCoord::new(1, 0)));
        store.take_mesh_dirty();

        let mut s = scheduler(Arc::new(MemoryStore::new()));
        s.queue_chunks_around(&store, 0.0, 0.0, 0);
        drain(&mut s, &mut store);

        let mut dirty = store.take_mesh_dirty();
        dirty.sort();
        assert_eq!(dirty, vec![ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]);
    }

    #[test]
    fn test_persisted_chunk_preferred() {
        let storage = Arc::new(MemoryStore::new());
        let mut saved = Chunk::new(ChunkCoord::new(0, 0));
        saved.set_block(5, 5, 5, Block::Planks);
        save_chunk(storage.as_ref(), &saved).unwrap();

        let mut store = WorldStore::new();
        let mut s = scheduler(storage);
        s.queue_chunks_around(&store, 0.0, 0.0, 0);
        drain(&mut s, &mut store);

        assert_eq!(store.get_block(5, 5, 5), Block::Planks);
        // Persisted chunk was all air otherwise: no generated bedrock.
        assert_eq!(store.get_block(0, 0, 0), Block::Air);
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            Err(StorageError::Io {
                key: key.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk gone"),
            })
        }

        fn put(&self, key: &str, _value: &[u8]) -> StorageResult<()> {
            Err(StorageError::Io {
                key: key.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk gone"),
            })
        }
    }

    #[test]
    fn test_failed_load_releases_slot_and_allows_retry() {
        let mut store = WorldStore::new();
        let mut s = scheduler(Arc::new(FailingStore));
        s.queue_chunks_around(&store, 0.0, 0.0, 1);
        drain(&mut s, &mut store);

        assert!(store.is_empty());
        assert_eq!(s.in_flight(), 0);
        assert_eq!(s.stats().failed, 9);
        // Failed coordinates can be queued again.
        assert_eq!(s.queue_chunks_around(&store, 0.0, 0.0, 1), 9);
    }

    #[test]
    fn test_unload_saves_dirty_before_evicting() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = WorldStore::new();
        let generator = TerrainGenerator::new(WorldSeed::new(42));
        for cx in 0..6 {
            store.insert_chunk(generator.generate(ChunkCoord::new(cx, 0)));
        }
        assert!(store.set_block(5 * 16 + 3, 90, 3, Block::Planks));

        let mut s = scheduler(storage.clone());
        let report = s.unload_far_chunks(&mut store, 0.0, 0.0, 2);
        assert_eq!(report.evicted, 3);
        assert_eq!(report.saved, 1);
        assert!(!store.contains(ChunkCoord::new(5, 0)));

        let reloaded = load_chunk(storage.as_ref(), ChunkCoord::new(5, 0)).unwrap().unwrap();
        assert_eq!(reloaded.get_block(3, 90, 3), Block::Planks);
        // Clean chunks are simply dropped.
        assert!(storage.get(&ChunkCoord::new(4, 0).storage_key()).unwrap().is_none());
    }

    #[test]
    fn test_failed_save_keeps_chunk() {
        let mut store = WorldStore::new();
        let mut chunk = Chunk::new(ChunkCoord::new(10, 10));
        chunk.set_block(0, 1, 0, Block::Stone);
        store.insert_chunk(chunk);

        let mut s = scheduler(Arc::new(FailingStore));
        let report = s.unload_far_chunks(&mut store, 0.0, 0.0, 2);
        assert_eq!(report.evicted, 0);
        assert_eq!(report.failed, vec![ChunkCoord::new(10, 10)]);
        assert!(store.chunk(ChunkCoord::new(10, 10)).unwrap().dirty);
    }

    #[test]
    fn test_flush_clears_dirty() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = WorldStore::new();
        store.insert_chunk(Chunk::new(ChunkCoord::new(0, 0)));
        store.set_block(1, 1, 1, Block::Dirt);

        let mut s = scheduler(storage.clone());
        let report = s.flush_dirty_chunks(&mut store);
        assert_eq!(report.saved, 1);
        assert!(store.dirty_coords().is_empty());
        assert_eq!(storage.len(), 1);
        assert_eq!(s.flush_dirty_chunks(&mut store).saved, 0);
    }
}
