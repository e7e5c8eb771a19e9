//! # TERRA Procedural Generation
//!
//! Deterministic world generation and the chunk lifecycle around it.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same world
//! 2. **Chunked**: World is generated in fixed-size 16x96x16 chunks
//! 3. **Streamable**: Chunks load nearest-first, at most two at a time
//! 4. **Durable**: Dirty chunks are saved before they are evicted
//!
//! ## Core Components
//!
//! - `ValueNoise`: 2D/3D smoothed lattice noise
//! - `TerrainGenerator`: Produces chunks from noise
//! - `WorldStore`: Resident chunks, block access, mesh-dirty propagation
//! - `StreamingScheduler`: Load queue, worker pool, eviction
//! - `KeyValueStore`: Storage seam (`MemoryStore`, `FileStore`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use terra_procedural::{MemoryStore, StreamingScheduler, TerrainGenerator, WorldSeed, WorldStore};
//!
//! let generator = TerrainGenerator::new(WorldSeed::new(42));
//! let mut scheduler = StreamingScheduler::new(generator, Arc::new(MemoryStore::new()));
//! let mut world = WorldStore::new();
//!
//! // Every tick:
//! scheduler.queue_chunks_around(&world, 100.0, 200.0, 4);
//! scheduler.process_load_queue();
//! scheduler.poll_completed(&mut world);
//! scheduler.unload_far_chunks(&mut world, 100.0, 200.0, 6);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod generator;
pub mod noise;
pub mod persistence;
pub mod store;
pub mod streaming;

pub use chunk::{Chunk, CHUNK_BYTES};
pub use generator::TerrainGenerator;
pub use noise::{NoiseField, ValueNoise, WorldSeed};
pub use persistence::{
    load_chunk, save_chunk, FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult,
};
pub use store::WorldStore;
pub use streaming::{
    evict_chunks, flush_dirty, FlushReport, PollSummary, SchedulerStats, StreamingScheduler,
    MAX_IN_FLIGHT_LOADS,
};
