//! # Range Validation
//!
//! Structural decoding only proves a message has the right shape. These
//! checks run afterwards and reject anything a well-behaved peer would never
//! send. A message that fails here is dropped before it reaches any state.

use terra_shared::{BlockPos, Vec3, CHUNK_HEIGHT_I32, HOTBAR_SLOTS};

use super::messages::{ClientMessage, InputFrame, ServerMessage};
use super::ProtocolError;

/// Longest accepted nickname, in characters.
pub const MAX_NICKNAME_CHARS: usize = 24;
/// Longest accepted room code, in characters.
pub const MAX_ROOM_CODE_CHARS: usize = 32;
/// Longest accepted recipe id, in characters.
pub const MAX_RECIPE_ID_CHARS: usize = 32;
/// Longest accepted frame duration, in seconds.
pub const MAX_INPUT_DT: f32 = 0.2;
/// Targets may sit this far outside the chunk's vertical range.
pub const TARGET_Y_MARGIN: i32 = 64;
/// Largest chunk radius a server may stream.
pub const MAX_VIEW_DISTANCE: i32 = 16;

fn check(ok: bool, what: &'static str) -> Result<(), ProtocolError> {
    if ok {
        Ok(())
    } else {
        Err(ProtocolError::OutOfRange(what))
    }
}

fn check_len(text: &str, min: usize, max: usize, what: &'static str) -> Result<(), ProtocolError> {
    let len = text.chars().count();
    check(len >= min && len <= max, what)
}

fn check_target(pos: BlockPos) -> Result<(), ProtocolError> {
    check(
        (-TARGET_Y_MARGIN..CHUNK_HEIGHT_I32 + TARGET_Y_MARGIN).contains(&pos.y),
        "target y",
    )
}

fn check_input(frame: &InputFrame) -> Result<(), ProtocolError> {
    let floats = [frame.dt, frame.move_x, frame.move_z, frame.yaw, frame.pitch];
    check(floats.iter().all(|f| f.is_finite()), "non-finite input")?;
    check(frame.dt > 0.0 && frame.dt <= MAX_INPUT_DT, "dt")?;
    check((-1.0..=1.0).contains(&frame.move_x), "moveX")?;
    check((-1.0..=1.0).contains(&frame.move_z), "moveZ")?;
    check((-90.0..=90.0).contains(&frame.pitch), "pitch")
}

/// Checks the value ranges of a decoded client message.
///
/// # Errors
///
/// Returns `OutOfRange` naming the first offending field.
pub fn validate_client(message: &ClientMessage) -> Result<(), ProtocolError> {
    match message {
        ClientMessage::Hello { nickname, room_code, .. } => {
            check_len(nickname.trim(), 1, MAX_NICKNAME_CHARS, "nickname")?;
            check_len(room_code, 0, MAX_ROOM_CODE_CHARS, "roomCode")
        }
        ClientMessage::Input(frame) => check_input(frame),
        ClientMessage::ActionMine { target } => check_target(*target),
        ClientMessage::ActionPlace { target, normal, selected_slot } => {
            check_target(*target)?;
            check(normal.is_unit_axis(), "normal")?;
            check(*selected_slot < HOTBAR_SLOTS, "selectedSlot")
        }
        ClientMessage::ActionCraft { recipe_id } => {
            check_len(recipe_id, 1, MAX_RECIPE_ID_CHARS, "recipeId")
        }
        ClientMessage::HotbarSelect { slot } => check(*slot < HOTBAR_SLOTS, "slot"),
        ClientMessage::ActionAttack { .. } | ClientMessage::Ping { .. } => Ok(()),
    }
}

fn finite_entity(position: Vec3, velocity: Vec3, extra: &[f32]) -> bool {
    position.is_finite() && velocity.is_finite() && extra.iter().all(|f| f.is_finite())
}

/// Checks the value ranges of a decoded server message.
///
/// # Errors
///
/// Returns `OutOfRange` naming the first offending field.
pub fn validate_server(message: &ServerMessage) -> Result<(), ProtocolError> {
    match message {
        ServerMessage::Snapshot(snapshot) => {
            for p in &snapshot.players {
                check(finite_entity(p.position, p.velocity, &[p.yaw, p.pitch, p.health]), "player")?;
            }
            for m in &snapshot.mobs {
                check(finite_entity(m.position, m.velocity, &[m.yaw, m.health]), "mob")?;
            }
            Ok(())
        }
        ServerMessage::InventoryUpdate { hotbar, selected_slot } => {
            check(*selected_slot < HOTBAR_SLOTS, "selectedSlot")?;
            check(
                hotbar
                    .iter()
                    .flatten()
                    .all(|s| s.count > 0 && s.count <= s.item.max_stack()),
                "hotbar",
            )
        }
        ServerMessage::Welcome { room_code, view_distance, .. } => {
            check_len(room_code, 0, MAX_ROOM_CODE_CHARS, "roomCode")?;
            check((0..=MAX_VIEW_DISTANCE).contains(view_distance), "viewDistance")
        }
        ServerMessage::ChunkData { .. }
        | ServerMessage::Event { .. }
        | ServerMessage::Error { .. }
        | ServerMessage::Pong { .. } => Ok(()),
    }
}
