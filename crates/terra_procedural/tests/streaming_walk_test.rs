//! # Streaming Walk Integration Test
//!
//! A viewer walks across the world; the scheduler must keep ground under it,
//! keep memory bounded, and bring edits back after evicting them.

use std::sync::Arc;
use std::time::Duration;

use terra_procedural::{
    KeyValueStore, MemoryStore, StreamingScheduler, TerrainGenerator, WorldSeed, WorldStore,
    MAX_IN_FLIGHT_LOADS,
};
use terra_shared::{Block, ChunkCoord};

const LOAD_RADIUS: i32 = 2;
const UNLOAD_RADIUS: i32 = 3;

fn settle(scheduler: &mut StreamingScheduler, world: &mut WorldStore) {
    loop {
        scheduler.process_load_queue();
        assert!(scheduler.in_flight() <= MAX_IN_FLIGHT_LOADS);
        if scheduler.in_flight() == 0 && scheduler.queued().is_empty() {
            break;
        }
        scheduler.wait_completed(world, Duration::from_secs(5));
    }
}

#[test]
fn test_walk_keeps_ground_and_bounds_memory() {
    let generator = TerrainGenerator::new(WorldSeed::new(42));
    let mut scheduler = StreamingScheduler::new(generator, Arc::new(MemoryStore::new()));
    let mut world = WorldStore::new();

    let z = 8.0f32;
    let mut x = 8.0f32;
    for _ in 0..40 {
        x += 16.0;
        scheduler.queue_chunks_around(&world, x, z, LOAD_RADIUS);
        settle(&mut scheduler, &mut world);
        scheduler.unload_far_chunks(&mut world, x, z, UNLOAD_RADIUS);

        #[allow(clippy::cast_possible_truncation)]
        let column = (x as i32, z as i32);
        assert!(
            world.highest_solid_y(column.0, column.1).is_some(),
            "no ground at x={x}"
        );
        let side = (2 * UNLOAD_RADIUS + 1) as usize;
        assert!(world.len() <= side * side);
    }

    assert!(scheduler.stats().evicted > 0);
}

#[test]
fn test_edit_survives_eviction() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let generator = TerrainGenerator::new(WorldSeed::new(9));
    let mut scheduler = StreamingScheduler::new(generator, Arc::clone(&storage));
    let mut world = WorldStore::new();

    scheduler.queue_chunks_around(&world, 0.0, 0.0, 0);
    settle(&mut scheduler, &mut world);
    assert!(world.set_block(4, 91, 4, Block::Cobblestone));

    // Walk far away: the edited chunk is flushed and evicted.
    scheduler.unload_far_chunks(&mut world, 1000.0, 0.0, 1);
    assert!(!world.contains(ChunkCoord::new(0, 0)));

    // Walk back: the saved copy wins over regeneration.
    scheduler.queue_chunks_around(&world, 0.0, 0.0, 0);
    settle(&mut scheduler, &mut world);
    assert_eq!(world.get_block(4, 91, 4), Block::Cobblestone);
    assert!(!world.chunk(ChunkCoord::new(0, 0)).unwrap().dirty);
}

#[test]
fn test_regenerated_chunk_matches_direct_generation() {
    let generator = TerrainGenerator::new(WorldSeed::new(31337));
    let mut scheduler = StreamingScheduler::new(generator, Arc::new(MemoryStore::new()));
    let mut world = WorldStore::new();

    scheduler.queue_chunks_around(&world, -40.0, 70.0, 1);
    settle(&mut scheduler, &mut world);

    for coord in world.coords().collect::<Vec<_>>() {
        let direct = generator.generate(coord);
        assert_eq!(world.chunk(coord).unwrap().codes(), direct.codes());
    }
}
