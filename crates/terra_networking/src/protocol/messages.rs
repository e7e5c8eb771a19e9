//! # Message Types
//!
//! Both directions are closed sets of variants, tagged by a `type` field
//! with snake_case names. Field names are camelCase on the wire.
//!
//! ```text
//! {"type":"input","seq":12,"dt":0.05,"moveX":0.0,"moveZ":1.0,
//!  "jump":false,"sprint":true,"yaw":90.0,"pitch":-10.0}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use terra_economy::ItemStack;
use terra_shared::{Block, BlockPos, Vec3, HOTBAR_SLOTS};

/// One tick of player intent, tagged with its sequence number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFrame {
    /// Monotonically increasing per client, starting at 1.
    pub seq: u32,
    /// Frame duration in seconds.
    pub dt: f32,
    /// Strafe axis in `[-1, 1]`.
    pub move_x: f32,
    /// Forward axis in `[-1, 1]`.
    pub move_z: f32,
    /// Jump held.
    pub jump: bool,
    /// Sprint held.
    pub sprint: bool,
    /// Heading in degrees.
    pub yaw: f32,
    /// Look pitch in degrees, `[-90, 90]`.
    pub pitch: f32,
}

/// Client to server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join request.
    Hello {
        /// Requested display name.
        nickname: String,
        /// Room the client wants to join.
        room_code: String,
        /// Must equal [`terra_shared::PROTOCOL_VERSION`].
        client_version: u32,
    },
    /// Movement intent for one frame.
    Input(InputFrame),
    /// Break the block at `target`.
    ActionMine {
        /// Block to break.
        target: BlockPos,
    },
    /// Place the selected item against a face of `target`.
    ActionPlace {
        /// Block being clicked.
        target: BlockPos,
        /// Unit axis of the clicked face.
        normal: BlockPos,
        /// Hotbar slot to place from.
        selected_slot: usize,
    },
    /// Craft a recipe from the hotbar.
    ActionCraft {
        /// Recipe identifier.
        recipe_id: String,
    },
    /// Melee a mob.
    ActionAttack {
        /// Mob entity id.
        target_entity_id: u32,
    },
    /// Change the selected hotbar slot.
    HotbarSelect {
        /// New slot.
        slot: usize,
    },
    /// Latency probe.
    Ping {
        /// Client clock in milliseconds, echoed back.
        client_time: u64,
    },
}

/// Authoritative state of one player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Player entity id.
    pub id: u32,
    /// Display name.
    pub nickname: String,
    /// Feet position.
    pub position: Vec3,
    /// Velocity in blocks per second.
    pub velocity: Vec3,
    /// Heading in degrees.
    pub yaw: f32,
    /// Look pitch in degrees.
    pub pitch: f32,
    /// Current health.
    pub health: f32,
    /// Highest input `seq` the server has simulated.
    pub last_input_seq: u32,
}

/// Authoritative state of one mob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobState {
    /// Mob entity id.
    pub id: u32,
    /// Feet position.
    pub position: Vec3,
    /// Velocity in blocks per second.
    pub velocity: Vec3,
    /// Heading in degrees.
    pub yaw: f32,
    /// Current health.
    pub health: f32,
}

/// A block edit since the previous snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChange {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
    /// New block.
    pub block: Block,
}

/// Periodic world state broadcast.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Server tick the snapshot was taken on.
    pub tick: u64,
    /// Every joined player.
    pub players: Vec<PlayerState>,
    /// Every live mob.
    pub mobs: Vec<MobState>,
    /// Block edits since the previous snapshot, in order.
    pub changed_blocks: Vec<BlockChange>,
}

/// Kind of a gameplay event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A player was admitted.
    PlayerJoined,
    /// A player disconnected.
    PlayerLeft,
    /// A player died or fell out of the world and was respawned.
    PlayerRespawned,
    /// A mob hit a player.
    PlayerHurt,
    /// A player killed a mob.
    MobKilled,
}

/// Error codes sent in `error` messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unparseable or out-of-range message.
    BadMessage,
    /// Anything but `hello` before joining.
    NotJoined,
    /// `hello` on a joined connection.
    AlreadyJoined,
    /// `clientVersion` differs from the server's.
    VersionMismatch,
    /// `roomCode` differs from the server's.
    WrongRoom,
    /// Player cap reached.
    RoomFull,
    /// Another connection is playing under that nickname.
    NicknameTaken,
}

impl ErrorCode {
    /// True for codes that end the connection.
    #[must_use]
    pub const fn closes_connection(self) -> bool {
        matches!(
            self,
            Self::VersionMismatch | Self::WrongRoom | Self::RoomFull | Self::NicknameTaken
        )
    }
}

/// Server to client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Admission accepted.
    Welcome {
        /// The client's own entity id.
        player_id: u32,
        /// Current server tick.
        server_tick: u64,
        /// World seed.
        seed: u64,
        /// Room joined.
        room_code: String,
        /// Player cap.
        max_players: usize,
        /// Chunk radius the server streams around each player.
        #[serde(default)]
        view_distance: i32,
    },
    /// Periodic world state.
    Snapshot(Snapshot),
    /// Full block buffer of one chunk.
    ChunkData {
        /// Chunk X.
        cx: i32,
        /// Chunk Z.
        cz: i32,
        /// Base64 of the little-endian `u16` buffer.
        blocks_base64: String,
    },
    /// Authoritative hotbar contents.
    InventoryUpdate {
        /// Slots in order.
        hotbar: [Option<ItemStack>; HOTBAR_SLOTS],
        /// Selected slot.
        selected_slot: usize,
    },
    /// Gameplay event.
    Event {
        /// What happened.
        kind: EventKind,
        /// Event-specific fields.
        payload: Value,
    },
    /// Request rejected.
    Error {
        /// Machine-readable reason.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
    /// Reply to `ping`.
    Pong {
        /// Echoed client clock.
        client_time: u64,
        /// Milliseconds since server start.
        server_time: u64,
    },
}

impl ServerMessage {
    /// Builds an `error` message.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into() }
    }
}
