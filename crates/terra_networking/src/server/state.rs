//! Per-player server state.

use std::collections::HashSet;

use terra_economy::Hotbar;
use terra_shared::{ChunkCoord, Vec3, MAX_HEALTH};

use crate::persistence::PlayerRecord;
use crate::physics::{Body, MoveIntent};
use crate::protocol::{InputFrame, PlayerState};

use super::connection::ConnectionId;

/// A joined player.
#[derive(Clone, Debug)]
pub struct Player {
    /// Entity id.
    pub id: u32,
    /// Owning connection.
    pub connection: ConnectionId,
    /// Sanitized nickname.
    pub nickname: String,
    /// Physics body.
    pub body: Body,
    /// Heading in degrees.
    pub yaw: f32,
    /// Look pitch in degrees.
    pub pitch: f32,
    /// Current health.
    pub health: f32,
    /// Hotbar.
    pub hotbar: Hotbar,
    /// Most recent input; applied every tick until replaced.
    pub input: Option<InputFrame>,
    /// `seq` of the last input simulated.
    pub last_input_seq: u32,
    /// Tick of the last successful mine.
    pub last_mine_tick: Option<u64>,
    /// Tick of the last successful attack.
    pub last_attack_tick: Option<u64>,
    /// Chunks already sent to this player.
    pub known_chunks: HashSet<ChunkCoord>,
}

impl Player {
    /// A player at `position` with full health and an empty hotbar.
    #[must_use]
    pub fn spawn(id: u32, connection: ConnectionId, nickname: String, position: Vec3) -> Self {
        Self {
            id,
            connection,
            nickname,
            body: Body::player(position),
            yaw: 0.0,
            pitch: 0.0,
            health: MAX_HEALTH,
            hotbar: Hotbar::new(),
            input: None,
            last_input_seq: 0,
            last_mine_tick: None,
            last_attack_tick: None,
            known_chunks: HashSet::new(),
        }
    }

    /// A player restored from a saved record.
    #[must_use]
    pub fn restore(id: u32, connection: ConnectionId, record: PlayerRecord) -> Self {
        let health = record.restored_health();
        let mut player = Self::spawn(id, connection, record.nickname, record.position);
        player.body.velocity = record.velocity;
        player.yaw = record.yaw;
        player.pitch = record.pitch;
        player.health = health;
        player.hotbar = record.hotbar;
        player
    }

    /// Snapshot of the state worth saving.
    #[must_use]
    pub fn record(&self) -> PlayerRecord {
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

    /// Wire form for snapshots.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            nickname: self.nickname.clone(),
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.yaw,
            pitch: self.pitch,
            health: self.health,
            last_input_seq: self.last_input_seq,
        }
    }

    /// Intent of the current input; standing still when there is none.
    #[must_use]
    pub fn intent(&self) -> MoveIntent {
        self.input.map_or(
            MoveIntent { yaw: self.yaw, pitch: self.pitch, ..MoveIntent::default() },
            |frame| MoveIntent::from(&frame),
        )
    }

    /// Chunk column the player stands in.
    #[must_use]
    pub fn chunk(&self) -> ChunkCoord {
        ChunkCoord::from_position(self.body.position.x, self.body.position.z)
    }
}
