//! Single-player session: the world streams from local storage in the
//! background while the player moves.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use terra_economy::Hotbar;
use terra_procedural::{
    FlushReport, KeyValueStore, PollSummary, StreamingScheduler, TerrainGenerator, WorldSeed,
    WorldStore,
};
use terra_shared::{ChunkCoord, Vec3, MAX_HEALTH, TICK_RATE, VOID_FLOOR};

use crate::persistence::{
    load_player, load_world_meta, save_player, save_world_meta, PlayerRecord, WorldMeta,
};
use crate::physics::{simulate_player, Body, MoveIntent};

/// Extra rings kept resident beyond the view distance.
const UNLOAD_MARGIN: i32 = 2;
/// Ticks between autosaves.
const AUTOSAVE_TICKS: u64 = 30 * TICK_RATE as u64;

/// An offline world with one player.
pub struct LocalSession {
    nickname: String,
    generator: TerrainGenerator,
    storage: Arc<dyn KeyValueStore>,
    world: WorldStore,
    scheduler: StreamingScheduler,
    body: Body,
    yaw: f32,
    pitch: f32,
    health: f32,
    hotbar: Hotbar,
    view_distance: i32,
    tick: u64,
}

impl LocalSession {
    /// Opens the world in `storage`, restoring `nickname` if it was saved.
    ///
    /// A stored world seed wins over `seed`. A fresh player spawns above
    /// the surface at column (0, 0).
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh world's metadata cannot be written.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        seed: u64,
        nickname: impl Into<String>,
        view_distance: i32,
    ) -> terra_procedural::StorageResult<Self> {
        let nickname = nickname.into();
        let seed = match load_world_meta(storage.as_ref()) {
            Some(meta) => meta.seed,
            None => {
                save_world_meta(storage.as_ref(), &WorldMeta { seed })?;
                seed
            }
        };
        let generator = TerrainGenerator::new(WorldSeed::new(seed));

        let mut session = Self {
            nickname,
            generator,
            scheduler: StreamingScheduler::new(generator, Arc::clone(&storage)),
            storage,
            world: WorldStore::new(),
            body: Body::player(Vec3::ZERO),
            yaw: 0.0,
            pitch: 0.0,
            health: MAX_HEALTH,
            hotbar: Hotbar::new(),
            view_distance: view_distance.max(1),
            tick: 0,
        };
        match load_player(session.storage.as_ref(), &session.nickname) {
            Some(record) => {
                debug!(nickname = %session.nickname, "restoring saved player");
                session.body.teleport(record.position);
                session.body.velocity = record.velocity;
                session.yaw = record.yaw;
                session.pitch = record.pitch;
                session.health = record.restored_health();
                session.hotbar = record.hotbar;
            }
            None => session.body.teleport(session.spawn_point()),
        }
        info!(seed, nickname = %session.nickname, "local world opened");
        Ok(session)
    }

    fn spawn_point(&self) -> Vec3 {
        #[allow(clippy::cast_precision_loss)]
        let y = (self.generator.surface_height(0, 0) + 1) as f32;
        Vec3::new(0.5, y, 0.5)
    }

    /// Runs one tick: merge finished loads, move the player, queue and
    /// dispatch loads around it, unload what is far away, autosave.
    ///
    /// The player is frozen while its own chunk is not resident yet.
    pub fn tick(&mut self, intent: &MoveIntent, dt: f32) -> PollSummary {
        self.tick += 1;
        let merged = self.scheduler.poll_completed(&mut self.world);

        let here = ChunkCoord::from_position(self.body.position.x, self.body.position.z);
        if self.world.contains(here) {
            simulate_player(&mut self.body, intent, dt, &self.world);
            self.yaw = intent.yaw;
            self.pitch = intent.pitch;
        }
        if self.body.position.y < VOID_FLOOR || self.health <= 0.0 {
            debug!("respawning");
            let spawn = self.spawn_point();
            self.body.teleport(spawn);
            self.health = MAX_HEALTH;
        }

        let Vec3 { x, z, .. } = self.body.position;
        self.scheduler.queue_chunks_around(&self.world, x, z, self.view_distance);
        self.scheduler.process_load_queue();
        self.scheduler
            .unload_far_chunks(&mut self.world, x, z, self.view_distance + UNLOAD_MARGIN);

        if self.tick % AUTOSAVE_TICKS == 0 {
            self.save();
        }
        merged
    }

    /// Waits up to `timeout` for in-flight loads and merges them.
    pub fn wait_for_chunks(&mut self, timeout: Duration) -> PollSummary {
        self.scheduler.wait_completed(&mut self.world, timeout)
    }

    fn record(&self) -> PlayerRecord {
        PlayerRecord {
            nickname: self.nickname.clone(),
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.yaw,
            pitch: self.pitch,
            health: self.health,
            hotbar: self.hotbar.clone(),
        }
    }

    fn save(&mut self) -> FlushReport {
        let report = self.scheduler.flush_dirty_chunks(&mut self.world);
        if let Err(e) = save_player(self.storage.as_ref(), &self.record()) {
            warn!(error = %e, "player save failed");
        }
        debug!(saved = report.saved, failed = report.failed.len(), "autosave");
        report
    }

    /// Saves every dirty chunk and the player record.
    pub fn shutdown(&mut self) -> FlushReport {
        let report = self.save();
        info!(chunks = report.saved, "local world saved");
        report
    }

    /// Resident chunks.
    #[must_use]
    pub const fn world(&self) -> &WorldStore {
        &self.world
    }

    /// Resident chunks, for block edits.
    pub fn world_mut(&mut self) -> &mut WorldStore {
        &mut self.world
    }

    /// The player's body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// The player's hotbar.
    pub fn hotbar_mut(&mut self) -> &mut Hotbar {
        &mut self.hotbar
    }

    /// Chunk loader.
    #[must_use]
    pub const fn scheduler(&self) -> &StreamingScheduler {
        &self.scheduler
    }
}
