//! # Game Client
//!
//! Client-side state for a networked session, plus the single-player
//! [`LocalSession`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CLIENT SESSION                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Predictor    │  │ RemoteEntities│ │ Hotbar       │       │
//! │  │ (local body) │  │ (others, mobs)│ │ (server copy)│       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                                 │
//! │         └────────────────┬┘                                 │
//! │              ┌───────────▼───────────┐                      │
//! │              │ WorldStore (streamed) │                      │
//! │              └───────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session does no I/O: the caller feeds it every line received and
//! sends whatever messages it returns.

mod local;

pub use local::LocalSession;

use serde_json::Value;
use tracing::{debug, trace, warn};

use terra_economy::Hotbar;
use terra_procedural::WorldStore;
use terra_shared::{ChunkCoord, Vec3, PROTOCOL_VERSION};

use crate::interpolation::RemoteEntities;
use crate::physics::MoveIntent;
use crate::prediction::{Predictor, ReconciliationResult};
use crate::protocol::{
    decode_chunk_blocks, decode_server, ClientMessage, ErrorCode, EventKind, ProtocolError,
    ServerMessage, Snapshot,
};

/// Chunk radius assumed when the welcome does not carry one.
pub const DEFAULT_VIEW_DISTANCE: i32 = 4;

/// Chunks this far beyond the view radius are still kept, so a player
/// walking back and forth over a border does not refetch.
pub const CHUNK_KEEP_MARGIN: i32 = 2;

/// Connection state as seen by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// No hello sent yet, or the server closed the session.
    #[default]
    Disconnected,
    /// Hello sent, waiting for welcome.
    Connecting,
    /// Welcome received.
    Joined,
}

/// Client view of one networked session.
pub struct ClientSession {
    nickname: String,
    room_code: String,
    state: ClientState,
    player_id: Option<u32>,
    seed: Option<u64>,
    max_players: usize,
    view_distance: i32,
    server_tick: u64,
    world: WorldStore,
    predictor: Option<Predictor>,
    remotes: RemoteEntities,
    hotbar: Hotbar,
    last_reconciliation: Option<ReconciliationResult>,
    last_pong: Option<(u64, u64)>,
    errors: Vec<(ErrorCode, String)>,
    events: Vec<(EventKind, Value)>,
}

impl ClientSession {
    /// Creates a session that will join `room_code` as `nickname`.
    #[must_use]
    pub fn new(nickname: impl Into<String>, room_code: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            room_code: room_code.into(),
            state: ClientState::Disconnected,
            player_id: None,
            seed: None,
            max_players: 0,
            view_distance: DEFAULT_VIEW_DISTANCE,
            server_tick: 0,
            world: WorldStore::new(),
            predictor: None,
            remotes: RemoteEntities::new(),
            hotbar: Hotbar::new(),
            last_reconciliation: None,
            last_pong: None,
            errors: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The `hello` to send first.
    pub fn hello(&mut self) -> ClientMessage {
        self.state = ClientState::Connecting;
        ClientMessage::Hello {
            nickname: self.nickname.clone(),
            room_code: self.room_code.clone(),
            client_version: PROTOCOL_VERSION,
        }
    }

    /// A `ping` carrying the caller's clock.
    #[must_use]
    pub const fn ping(client_time: u64) -> ClientMessage {
        ClientMessage::Ping { client_time }
    }

    /// Decodes and applies one received line.
    ///
    /// # Errors
    ///
    /// Returns the decode error; the session is left unchanged.
    pub fn handle_raw(&mut self, raw: &str) -> Result<(), ProtocolError> {
        let message = decode_server(raw)?;
        self.handle_message(message);
        Ok(())
    }

    /// Applies one server message.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { player_id, server_tick, seed, max_players, view_distance, .. } => {
                debug!(player_id, seed, view_distance, "joined");
                self.state = ClientState::Joined;
                self.player_id = Some(player_id);
                self.server_tick = server_tick;
                self.seed = Some(seed);
                self.max_players = max_players;
                if view_distance > 0 {
                    self.view_distance = view_distance;
                }
            }
            ServerMessage::ChunkData { cx, cz, blocks_base64 } => {
                let coord = ChunkCoord::new(cx, cz);
                match decode_chunk_blocks(coord, &blocks_base64) {
                    Some(chunk) => {
                        self.world.insert_chunk(chunk);
                    }
                    None => warn!(%coord, "undecodable chunk payload"),
                }
            }
            ServerMessage::Snapshot(snapshot) => self.apply_snapshot(&snapshot),
            ServerMessage::InventoryUpdate { hotbar, selected_slot } => {
                match Hotbar::from_slots(hotbar, selected_slot) {
                    Ok(hotbar) => self.hotbar = hotbar,
                    Err(e) => warn!(error = %e, "rejected inventory update"),
                }
            }
            ServerMessage::Event { kind, payload } => {
                if kind == EventKind::PlayerRespawned {
                    self.handle_respawn(&payload);
                }
                self.events.push((kind, payload));
            }
            ServerMessage::Error { code, message } => {
                debug!(?code, %message, "server error");
                if code.closes_connection() {
                    self.state = ClientState::Disconnected;
                }
                self.errors.push((code, message));
            }
            ServerMessage::Pong { client_time, server_time } => {
                self.last_pong = Some((client_time, server_time));
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.server_tick = snapshot.tick;
        for change in &snapshot.changed_blocks {
            self.world.set_block(change.x, change.y, change.z, change.block);
        }

        let local = self
            .player_id
            .and_then(|id| snapshot.players.iter().find(|p| p.id == id));
        if let Some(state) = local {
            match self.predictor.as_mut() {
                Some(predictor) => self.last_reconciliation = Some(predictor.reconcile(state)),
                None => {
                    let mut predictor = Predictor::new(state.position);
                    predictor.reconcile(state);
                    self.predictor = Some(predictor);
                }
            }
            self.forget_far_chunks();
        }
        self.remotes.apply_snapshot(snapshot, self.player_id);
    }

    /// The server never says which chunks went out of range, so chunks
    /// beyond the view radius plus margin are dropped here.
    fn forget_far_chunks(&mut self) {
        let Some(predictor) = self.predictor.as_ref() else {
            return;
        };
        let position = predictor.position();
        let center = ChunkCoord::from_position(position.x, position.z);
        let keep = self.view_distance + CHUNK_KEEP_MARGIN;
        let far: Vec<ChunkCoord> = self
            .world
            .coords()
            .filter(|coord| coord.ring_distance(center) > keep)
            .collect();
        for coord in far {
            self.world.remove_chunk(coord);
        }
        trace!(resident = self.world.len(), "client chunks");
    }

    fn handle_respawn(&mut self, payload: &Value) {
        let is_local = payload
            .get("playerId")
            .and_then(Value::as_u64)
            .is_some_and(|id| Some(id) == self.player_id.map(u64::from));
        if !is_local {
            return;
        }
        let position = payload
            .get("position")
            .and_then(|p| serde_json::from_value::<Vec3>(p.clone()).ok());
        if let (Some(predictor), Some(position)) = (self.predictor.as_mut(), position) {
            predictor.reset(position);
        }
    }

    /// Predicts one frame of local movement. Returns the `input` to send, or
    /// `None` before the first snapshot placed the player.
    pub fn predict(&mut self, intent: &MoveIntent, dt: f32) -> Option<ClientMessage> {
        let predictor = self.predictor.as_mut()?;
        predictor.predict(intent, dt, &self.world)
    }

    /// Advances remote entity interpolation by one rendered frame.
    pub fn advance(&mut self, dt: f32) {
        self.remotes.advance(dt);
    }

    /// Connection state.
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// Own player id, once joined.
    #[must_use]
    pub const fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    /// World seed, once joined.
    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Chunk radius the server streams.
    #[must_use]
    pub const fn view_distance(&self) -> i32 {
        self.view_distance
    }

    /// Room capacity from the welcome.
    #[must_use]
    pub const fn max_players(&self) -> usize {
        self.max_players
    }

    /// Tick of the latest snapshot or welcome.
    #[must_use]
    pub const fn server_tick(&self) -> u64 {
        self.server_tick
    }

    /// Chunks received so far.
    #[must_use]
    pub const fn world(&self) -> &WorldStore {
        &self.world
    }

    /// Local prediction, once the first snapshot arrived.
    #[must_use]
    pub const fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    /// Other players and mobs.
    #[must_use]
    pub const fn remotes(&self) -> &RemoteEntities {
        &self.remotes
    }

    /// Hotbar as last reported by the server.
    #[must_use]
    pub const fn hotbar(&self) -> &Hotbar {
        &self.hotbar
    }

    /// Outcome of the latest reconciliation.
    #[must_use]
    pub const fn last_reconciliation(&self) -> Option<ReconciliationResult> {
        self.last_reconciliation
    }

    /// Latest `(clientTime, serverTime)` pong.
    #[must_use]
    pub const fn last_pong(&self) -> Option<(u64, u64)> {
        self.last_pong
    }

    /// Errors received since the last call.
    pub fn take_errors(&mut self) -> Vec<(ErrorCode, String)> {
        std::mem::take(&mut self.errors)
    }

    /// Events received since the last call.
    pub fn take_events(&mut self) -> Vec<(EventKind, Value)> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_chunk_blocks, BlockChange, PlayerState};
    use serde_json::json;
    use terra_procedural::Chunk;
    use terra_shared::Block;

    fn joined() -> ClientSession {
        let mut session = ClientSession::new("ann", "lobby");
        session.hello();
        session.handle_message(ServerMessage::Welcome {
            player_id: 3,
            server_tick: 10,
            seed: 42,
            room_code: "lobby".to_owned(),
            max_players: 8,
            view_distance: 2,
        });
        session
    }

    fn me(position: Vec3) -> PlayerState {
        PlayerState {
            id: 3,
            nickname: "ann".to_owned(),
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            health: 20.0,
            last_input_seq: 0,
        }
    }

    #[test]
    fn test_hello_and_welcome() {
        let mut session = ClientSession::new("ann", "lobby");
        let hello = session.hello();
        assert!(matches!(hello, ClientMessage::Hello { client_version: PROTOCOL_VERSION, .. }));
        assert_eq!(session.state(), ClientState::Connecting);

        let session = joined();
        assert_eq!(session.state(), ClientState::Joined);
        assert_eq!(session.player_id(), Some(3));
        assert_eq!(session.seed(), Some(42));
    }

    #[test]
    fn test_chunks_and_block_changes() {
        let mut session = joined();
        let chunk = Chunk::new(ChunkCoord::new(0, 0));
        session.handle_message(ServerMessage::ChunkData {
            cx: 0,
            cz: 0,
            blocks_base64: encode_chunk_blocks(&chunk),
        });
        assert!(session.world().contains(ChunkCoord::new(0, 0)));

        let snapshot = Snapshot {
            tick: 12,
            changed_blocks: vec![BlockChange { x: 1, y: 5, z: 1, block: Block::Stone }],
            ..Snapshot::default()
        };
        session.handle_message(ServerMessage::Snapshot(snapshot));
        assert_eq!(session.world().get_block(1, 5, 1), Block::Stone);
        assert_eq!(session.server_tick(), 12);
    }

    #[test]
    fn test_walking_forgets_far_chunks() {
        let mut session = joined();
        assert_eq!(session.view_distance(), 2);
        let radius = session.view_distance();
        let keep = radius + CHUNK_KEEP_MARGIN;
        let bound = usize::try_from((2 * keep + 1) * (2 * keep + 1)).unwrap();

        for step in 0..50 {
            let center = ChunkCoord::new(step, 0);
            for dz in -radius..=radius {
                for dx in -radius..=radius {
                    let chunk = Chunk::new(ChunkCoord::new(center.x + dx, center.z + dz));
                    session.handle_message(ServerMessage::ChunkData {
                        cx: center.x + dx,
                        cz: center.z + dz,
                        blocks_base64: encode_chunk_blocks(&chunk),
                    });
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let x = (step * 16) as f32 + 8.0;
            let snapshot = Snapshot {
                tick: 11 + u64::try_from(step).unwrap(),
                players: vec![me(Vec3::new(x, 40.0, 8.0))],
                ..Snapshot::default()
            };
            session.handle_message(ServerMessage::Snapshot(snapshot));
            assert!(session.world().len() <= bound, "{} chunks at step {step}", session.world().len());
        }

        assert!(!session.world().contains(ChunkCoord::new(0, 0)));
        assert!(session.world().contains(ChunkCoord::new(49, 0)));
        assert!(session.world().contains(ChunkCoord::new(45, 0)));
    }

    #[test]
    fn test_first_snapshot_places_the_predictor() {
        let mut session = joined();
        assert!(session.predict(&MoveIntent::default(), 0.05).is_none());

        let snapshot = Snapshot { tick: 11, players: vec![me(Vec3::new(0.5, 40.0, 0.5))], ..Snapshot::default() };
        session.handle_message(ServerMessage::Snapshot(snapshot));
        let position = session.predictor().map(Predictor::position);
        assert_eq!(position, Some(Vec3::new(0.5, 40.0, 0.5)));
        assert!(session.remotes().is_empty());
        assert!(session.predict(&MoveIntent::default(), 0.05).is_some());
    }

    #[test]
    fn test_fatal_error_disconnects() {
        let mut session = ClientSession::new("ann", "lobby");
        session.hello();
        session.handle_message(ServerMessage::error(ErrorCode::VersionMismatch, "old client"));
        assert_eq!(session.state(), ClientState::Disconnected);
        assert_eq!(session.take_errors().len(), 1);
        assert!(session.take_errors().is_empty());
    }

    #[test]
    fn test_local_respawn_resets_prediction() {
        let mut session = joined();
        let snapshot = Snapshot { tick: 11, players: vec![me(Vec3::new(0.5, 40.0, 0.5))], ..Snapshot::default() };
        session.handle_message(ServerMessage::Snapshot(snapshot));
        session.handle_message(ServerMessage::Event {
            kind: EventKind::PlayerRespawned,
            payload: json!({ "playerId": 3, "position": { "x": 0.5, "y": 70.0, "z": 0.5 } }),
        });
        let y = session.predictor().map(|p| p.position().y);
        assert_eq!(y, Some(70.0));
        assert_eq!(session.take_events().len(), 1);
    }

    #[test]
    fn test_handle_raw_rejects_garbage() {
        let mut session = joined();
        assert!(session.handle_raw("{not json").is_err());
        assert!(session.handle_raw(r#"{"type":"pong","clientTime":5,"serverTime":9}"#).is_ok());
        assert_eq!(session.last_pong(), Some((5, 9)));
    }
}
