//! # Authoritative Server
//!
//! The single source of truth for the shared world.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TERRA SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   NetworkEvent   ┌──────────────────┐     │
//! │  │ Socket tasks │ ───────────────► │ Tick thread      │     │
//! │  │ (tokio)      │ ◄─────────────── │ GameServer (20Hz)│     │
//! │  └──────────────┘     Outgoing     └────────┬─────────┘     │
//! │                                             │               │
//! │                               ┌─────────────▼─────────────┐ │
//! │                               │ WorldStore + KeyValueStore│ │
//! │                               └───────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`GameServer`] itself does no I/O besides storage. Inbound text goes in
//! through [`GameServer::handle_raw`]; everything it wants to say ends up in
//! an outbox drained by the transport. That makes the whole simulation
//! drivable from tests without a socket.
//!
//! ## Tick Order
//!
//! 1. Players: integrate latest input, respawn the dead and the fallen
//! 2. Mob spawning (every [`MOB_SPAWN_INTERVAL_TICKS`])
//! 3. Mob AI and physics
//! 4. Chunk streaming, nearest first, bounded per tick
//! 5. Snapshot broadcast (every `snapshot_divisor` ticks)
//! 6. Autosave and eviction (every `autosave_secs`)

mod actions;
mod config;
mod connection;
mod mobs;
mod state;
mod tick;
pub mod transport;

pub use actions::{mining_interval_ticks, ATTACK_COOLDOWN_TICKS, ATTACK_DAMAGE};
pub use config::{ConfigError, ServerConfig};
pub use connection::{ClientConnection, ConnectionId, ConnectionState, Outgoing, OutgoingAction};
pub use mobs::{
    Mob, MobHit, MOB_ATTACK_COOLDOWN_TICKS, MOB_CAP, MOB_DAMAGE, MOB_MAX_HEALTH,
    MOB_SPAWN_INTERVAL_TICKS,
};
pub use state::Player;
pub use tick::{TickLoop, TickStats};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use terra_economy::RecipeBook;
use terra_procedural::{
    evict_chunks, flush_dirty, load_chunk, KeyValueStore, StorageError, TerrainGenerator,
    WorldSeed, WorldStore,
};
use terra_shared::{ChunkCoord, Vec3, MAX_HEALTH, PROTOCOL_VERSION, VOID_FLOOR};

use crate::persistence::{load_player, load_world_meta, save_player, save_world_meta, WorldMeta};
use crate::physics::simulate_player;
use crate::protocol::{
    decode_client, encode_chunk_blocks, BlockChange, ClientMessage, ErrorCode, EventKind,
    ServerMessage, Snapshot, MAX_NICKNAME_CHARS,
};

/// Most chunks streamed to one player per tick after joining.
pub const CHUNKS_PER_TICK: usize = 4;
/// Resident chunks survive this many rings beyond every player's view.
pub const EVICT_MARGIN: i32 = 2;

/// Server failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Storage failed at startup.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Socket or runtime failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trims a requested nickname to `[A-Za-z0-9_-]`, at most 24 characters.
#[must_use]
pub fn sanitize_nickname(requested: &str, player_id: u32) -> String {
    let clean: String = requested
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_NICKNAME_CHARS)
        .collect();
    if clean.is_empty() {
        format!("player-{player_id}")
    } else {
        clean
    }
}

/// The authoritative game simulation.
pub struct GameServer {
    config: ServerConfig,
    generator: TerrainGenerator,
    storage: Arc<dyn KeyValueStore>,
    recipes: RecipeBook,
    world: WorldStore,
    connections: HashMap<ConnectionId, ClientConnection>,
    players: BTreeMap<u32, Player>,
    mobs: BTreeMap<u32, Mob>,
    changed_blocks: Vec<BlockChange>,
    next_player_id: u32,
    next_mob_id: u32,
    rng: ChaCha8Rng,
    tick: u64,
    started: Instant,
    outbox: Vec<Outgoing>,
}

impl GameServer {
    /// Opens the world in `storage`.
    ///
    /// A stored `world:meta` seed wins over the configured one so existing
    /// chunks keep matching the terrain generated around them.
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh world's metadata cannot be written.
    pub fn new(config: ServerConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, ServerError> {
        let seed = match load_world_meta(storage.as_ref()) {
            Some(meta) => {
                if meta.seed != config.seed {
                    warn!(stored = meta.seed, configured = config.seed, "using stored world seed");
                }
                meta.seed
            }
            None => {
                save_world_meta(storage.as_ref(), &WorldMeta { seed: config.seed })?;
                config.seed
            }
        };
        info!(seed, room = %config.room_code, "world opened");

        Ok(Self {
            generator: TerrainGenerator::new(WorldSeed::new(seed)),
            storage,
            recipes: RecipeBook::builtin(),
            world: WorldStore::new(),
            connections: HashMap::new(),
            players: BTreeMap::new(),
            mobs: BTreeMap::new(),
            changed_blocks: Vec::new(),
            next_player_id: 1,
            next_mob_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            started: Instant::now(),
            outbox: Vec::new(),
            config,
        })
    }

    /// Replaces the recipe book.
    #[must_use]
    pub fn with_recipes(mut self, recipes: RecipeBook) -> Self {
        self.recipes = recipes;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// World seed in use.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.generator.seed().value()
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Resident chunks.
    #[must_use]
    pub const fn world(&self) -> &WorldStore {
        &self.world
    }

    /// Resident chunks, for admin tooling. Edits made here are persisted
    /// but not broadcast.
    pub fn world_mut(&mut self) -> &mut WorldStore {
        &mut self.world
    }

    /// Open connections, joined or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Joined players by id.
    #[must_use]
    pub const fn players(&self) -> &BTreeMap<u32, Player> {
        &self.players
    }

    /// Live mobs by id.
    #[must_use]
    pub const fn mobs(&self) -> &BTreeMap<u32, Mob> {
        &self.mobs
    }

    /// The player owned by a connection.
    #[must_use]
    pub fn player_for(&self, connection: ConnectionId) -> Option<&Player> {
        let id = self.connections.get(&connection)?.player_id()?;
        self.players.get(&id)
    }

    /// Milliseconds since the server started.
    #[must_use]
    pub fn server_time_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Registers a new transport connection.
    pub fn connect(&mut self, connection: ConnectionId) {
        debug!(%connection, "connected");
        self.connections.insert(connection, ClientConnection::new(connection));
    }

    /// Forgets a connection, persisting and removing its player.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        let Some(conn) = self.connections.remove(&connection) else {
            return;
        };
        let Some(player) = conn.player_id().and_then(|id| self.players.remove(&id)) else {
            debug!(%connection, "unjoined connection closed");
            return;
        };
        if let Err(e) = save_player(self.storage.as_ref(), &player.record()) {
            warn!(nickname = %player.nickname, error = %e, "failed to save player on leave");
        }
        info!(%connection, id = player.id, nickname = %player.nickname, "player left");
        self.broadcast_event(
            EventKind::PlayerLeft,
            json!({ "playerId": player.id, "nickname": player.nickname }),
        );
    }

    /// Decodes and handles one inbound line.
    ///
    /// Malformed lines get `error{bad_message}` and change nothing else.
    pub fn handle_raw(&mut self, connection: ConnectionId, raw: &str) {
        let Some(conn) = self.connections.get_mut(&connection) else {
            debug!(%connection, "message for unknown connection");
            return;
        };
        match decode_client(raw) {
            Ok(message) => self.handle_message(connection, message),
            Err(e) => {
                conn.bad_messages += 1;
                debug!(%connection, error = %e, "dropping malformed message");
                self.send(connection, ServerMessage::error(ErrorCode::BadMessage, e.to_string()));
            }
        }
    }

    /// Handles one decoded message.
    pub fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage) {
        let Some(state) = self.connections.get(&connection).map(|c| c.state) else {
            return;
        };
        match (state, message) {
            (
                ConnectionState::Unjoined,
                ClientMessage::Hello { nickname, room_code, client_version },
            ) => self.admit(connection, &nickname, &room_code, client_version),
            (ConnectionState::Unjoined, _) => {
                self.send(connection, ServerMessage::error(ErrorCode::NotJoined, "send hello first"));
            }
            (ConnectionState::Joined { player_id }, message) => {
                self.handle_player_message(connection, player_id, message);
            }
        }
    }

    fn handle_player_message(&mut self, connection: ConnectionId, player_id: u32, message: ClientMessage) {
        match message {
            ClientMessage::Hello { .. } => {
                self.send(connection, ServerMessage::error(ErrorCode::AlreadyJoined, "already joined"));
            }
            ClientMessage::Input(frame) => {
                let Some(player) = self.players.get_mut(&player_id) else {
                    return;
                };
                if player.input.is_some_and(|prev| frame.seq <= prev.seq) {
                    trace!(player_id, seq = frame.seq, "stale input");
                    return;
                }
                player.yaw = frame.yaw;
                player.pitch = frame.pitch;
                player.input = Some(frame);
            }
            ClientMessage::ActionMine { target } => self.mine(player_id, target),
            ClientMessage::ActionPlace { target, normal, selected_slot } => {
                self.place(player_id, target, normal, selected_slot);
            }
            ClientMessage::ActionCraft { recipe_id } => self.craft(player_id, &recipe_id),
            ClientMessage::ActionAttack { target_entity_id } => self.attack(player_id, target_entity_id),
            ClientMessage::HotbarSelect { slot } => self.select_slot(player_id, slot),
            ClientMessage::Ping { client_time } => {
                let server_time = self.server_time_ms();
                self.send(connection, ServerMessage::Pong { client_time, server_time });
            }
        }
    }

    fn reject(&mut self, connection: ConnectionId, code: ErrorCode, message: String) {
        warn!(%connection, ?code, %message, "hello rejected");
        self.send(connection, ServerMessage::error(code, message));
        self.outbox.push(Outgoing { connection, action: OutgoingAction::Close });
        self.connections.remove(&connection);
    }

    fn admit(&mut self, connection: ConnectionId, nickname: &str, room_code: &str, client_version: u32) {
        if client_version != PROTOCOL_VERSION {
            let message = format!("server speaks protocol {PROTOCOL_VERSION}, client {client_version}");
            return self.reject(connection, ErrorCode::VersionMismatch, message);
        }
        if room_code != self.config.room_code {
            return self.reject(connection, ErrorCode::WrongRoom, format!("no room {room_code:?}"));
        }
        if self.players.len() >= self.config.max_players {
            let message = format!("{} players max", self.config.max_players);
            return self.reject(connection, ErrorCode::RoomFull, message);
        }
        let id = self.next_player_id;
        let nickname = sanitize_nickname(nickname, id);
        if self.players.values().any(|p| p.nickname == nickname) {
            return self.reject(connection, ErrorCode::NicknameTaken, format!("{nickname} is online"));
        }
        self.next_player_id += 1;

        let player = match load_player(self.storage.as_ref(), &nickname) {
            Some(record) => {
                debug!(%nickname, "restoring saved player");
                Player::restore(id, connection, record)
            }
            None => {
                let spawn = self.spawn_point();
                Player::spawn(id, connection, nickname, spawn)
            }
        };
        info!(%connection, id, nickname = %player.nickname, "player joined");
        let joined = json!({ "playerId": id, "nickname": player.nickname });
        self.players.insert(id, player);
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.state = ConnectionState::Joined { player_id: id };
        }

        self.send(
            connection,
            ServerMessage::Welcome {
                player_id: id,
                server_tick: self.tick,
                seed: self.seed(),
                room_code: self.config.room_code.clone(),
                max_players: self.config.max_players,
                view_distance: self.config.view_distance,
            },
        );
        self.send_inventory(id);
        self.stream_chunks(id, usize::MAX);
        self.broadcast_event(EventKind::PlayerJoined, joined);
    }

    /// Advances the simulation by one tick.
    pub fn tick(&mut self) {
        self.tick += 1;
        let dt = self.config.tick_dt();

        self.step_players(dt);
        if self.tick % MOB_SPAWN_INTERVAL_TICKS == 0 {
            self.try_spawn_mob();
        }
        self.step_mobs(dt);

        let ids: Vec<u32> = self.players.keys().copied().collect();
        for id in ids {
            self.stream_chunks(id, CHUNKS_PER_TICK);
        }

        if self.tick % u64::from(self.config.snapshot_divisor.max(1)) == 0 {
            self.broadcast_snapshot();
        }
        if self.tick % self.config.autosave_ticks() == 0 {
            self.autosave();
        }
    }

    fn step_players(&mut self, dt: f32) {
        let mut respawn = Vec::new();
        for player in self.players.values_mut() {
            let intent = player.intent();
            simulate_player(&mut player.body, &intent, dt, &self.world);
            if let Some(frame) = player.input {
                player.last_input_seq = frame.seq;
            }
            if player.body.position.y < VOID_FLOOR || player.health <= 0.0 {
                respawn.push(player.id);
            }
        }
        for id in respawn {
            self.respawn(id);
        }
    }

    fn respawn(&mut self, player_id: u32) {
        let spawn = self.spawn_point();
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.body.teleport(spawn);
        player.health = MAX_HEALTH;
        debug!(player_id, "respawned");
        self.broadcast_event(
            EventKind::PlayerRespawned,
            json!({ "playerId": player_id, "position": spawn }),
        );
    }

    /// Top of the default spawn column (0, 0), loading its chunk if needed.
    pub fn spawn_point(&mut self) -> Vec3 {
        self.ensure_chunk(ChunkCoord::from_block(0, 0));
        let top = self
            .world
            .highest_solid_y(0, 0)
            .unwrap_or_else(|| self.generator.surface_height(0, 0));
        #[allow(clippy::cast_precision_loss)]
        let y = (top + 1) as f32;
        Vec3::new(0.5, y, 0.5)
    }

    /// Makes a chunk resident: stored copy first, generation otherwise.
    fn ensure_chunk(&mut self, coord: ChunkCoord) {
        if self.world.contains(coord) {
            return;
        }
        let chunk = match load_chunk(self.storage.as_ref(), coord) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => self.generator.generate(coord),
            Err(e) => {
                warn!(%coord, error = %e, "chunk load failed, regenerating");
                self.generator.generate(coord)
            }
        };
        self.world.insert_chunk(chunk);
    }

    /// Spawns a mob at `position`. Returns its id.
    pub fn spawn_mob_at(&mut self, position: Vec3) -> u32 {
        let id = self.next_mob_id;
        self.next_mob_id += 1;
        self.mobs.insert(id, Mob::new(id, position));
        trace!(id, ?position, "mob spawned");
        id
    }

    fn try_spawn_mob(&mut self) {
        if self.mobs.len() >= MOB_CAP || self.players.is_empty() {
            return;
        }
        let positions: Vec<Vec3> = self.players.values().map(|p| p.body.position).collect();
        let around = positions[self.rng.gen_range(0..positions.len())];
        if let Some(spawn) = mobs::find_spawn_point(&self.world, &mut self.rng, around) {
            self.spawn_mob_at(spawn);
        }
    }

    fn step_mobs(&mut self, dt: f32) {
        let targets: Vec<(u32, Vec3)> = self
            .players
            .values()
            .filter(|p| p.health > 0.0)
            .map(|p| (p.id, p.body.position))
            .collect();
        let (hits, fallen) = mobs::update_mobs(&mut self.mobs, &targets, &self.world, self.tick, dt);
        if !fallen.is_empty() {
            trace!(?fallen, "mobs fell out of the world");
        }
        for hit in hits {
            let Some(player) = self.players.get_mut(&hit.player_id) else {
                continue;
            };
            player.health = (player.health - hit.damage).max(0.0);
            let health = player.health;
            self.broadcast_event(
                EventKind::PlayerHurt,
                json!({ "playerId": hit.player_id, "mobId": hit.mob_id, "health": health }),
            );
        }
    }

    /// Sends up to `limit` unsent chunks in view, nearest first, and forgets
    /// chunks that left the view.
    fn stream_chunks(&mut self, player_id: u32, limit: usize) {
        let radius = self.config.view_distance;
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let center = player.chunk();
        let connection = player.connection;
        let mut wanted: Vec<ChunkCoord> = (-radius..=radius)
            .flat_map(|dz| (-radius..=radius).map(move |dx| ChunkCoord::new(center.x + dx, center.z + dz)))
            .filter(|c| !player.known_chunks.contains(c))
            .collect();
        wanted.sort_by_key(|c| (c.distance_squared(center), *c));
        wanted.truncate(limit);

        for coord in &wanted {
            self.ensure_chunk(*coord);
            if let Some(chunk) = self.world.chunk(*coord) {
                let message = ServerMessage::ChunkData {
                    cx: coord.x,
                    cz: coord.z,
                    blocks_base64: encode_chunk_blocks(chunk),
                };
                self.send(connection, message);
            }
        }
        if let Some(player) = self.players.get_mut(&player_id) {
            player.known_chunks.extend(wanted);
            player.known_chunks.retain(|c| c.ring_distance(center) <= radius);
        }
    }

    fn broadcast_snapshot(&mut self) {
        let snapshot = Snapshot {
            tick: self.tick,
            players: self.players.values().map(Player::state).collect(),
            mobs: self.mobs.values().map(Mob::state).collect(),
            changed_blocks: std::mem::take(&mut self.changed_blocks),
        };
        self.broadcast(&ServerMessage::Snapshot(snapshot));
    }

    fn save_players(&self) -> usize {
        let mut saved = 0;
        for player in self.players.values() {
            match save_player(self.storage.as_ref(), &player.record()) {
                Ok(()) => saved += 1,
                Err(e) => warn!(nickname = %player.nickname, error = %e, "player save failed"),
            }
        }
        saved
    }

    /// Persists dirty chunks and players, then evicts chunks far from every
    /// player.
    pub fn autosave(&mut self) {
        let flushed = flush_dirty(self.storage.as_ref(), &mut self.world);
        let players = self.save_players();

        let keep = self.config.view_distance + EVICT_MARGIN;
        let centers: Vec<ChunkCoord> = self.players.values().map(Player::chunk).collect();
        let far: Vec<ChunkCoord> = self
            .world
            .coords()
            .filter(|c| centers.iter().all(|p| c.ring_distance(*p) > keep))
            .collect();
        let evicted = evict_chunks(self.storage.as_ref(), &mut self.world, &far);
        info!(
            chunks = flushed.saved + evicted.saved,
            players,
            evicted = evicted.evicted,
            resident = self.world.len(),
            "autosave"
        );
    }

    /// Persists everything and closes every connection.
    pub fn shutdown(&mut self) {
        let flushed = flush_dirty(self.storage.as_ref(), &mut self.world);
        let players = self.save_players();
        if !flushed.failed.is_empty() {
            warn!(failed = flushed.failed.len(), "some chunks could not be saved");
        }
        info!(chunks = flushed.saved, players, "shutdown save complete");
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort();
        for connection in ids {
            self.outbox.push(Outgoing { connection, action: OutgoingAction::Close });
        }
    }

    /// Takes every pending outbound action, in order.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, connection: ConnectionId, message: ServerMessage) {
        self.outbox.push(Outgoing { connection, action: OutgoingAction::Send(message) });
    }

    fn send_inventory(&mut self, player_id: u32) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let message = ServerMessage::InventoryUpdate {
            hotbar: *player.hotbar.slots(),
            selected_slot: player.hotbar.selected(),
        };
        let connection = player.connection;
        self.send(connection, message);
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let targets: Vec<ConnectionId> = self.players.values().map(|p| p.connection).collect();
        for connection in targets {
            self.send(connection, message.clone());
        }
    }

    fn broadcast_event(&mut self, kind: EventKind, payload: Value) {
        self.broadcast(&ServerMessage::Event { kind, payload });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_nickname() {
        assert_eq!(sanitize_nickname("  alice  ", 1), "alice");
        assert_eq!(sanitize_nickname("bob smith!", 1), "bobsmith");
        assert_eq!(sanitize_nickname("???", 4), "player-4");
        assert_eq!(sanitize_nickname(&"x".repeat(40), 1).len(), MAX_NICKNAME_CHARS);
    }
}
