//! # World & Network Constants
//!
//! Values that client and server must agree on. Changing any of these is a
//! protocol change and requires bumping [`PROTOCOL_VERSION`].

// =============================================================================
// WORLD GEOMETRY
// =============================================================================

/// Horizontal chunk edge length, in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Vertical chunk extent, in blocks.
pub const CHUNK_HEIGHT: usize = 96;

/// Number of cells in one chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT;

/// [`CHUNK_SIZE`] as a signed coordinate.
#[allow(clippy::cast_possible_wrap)]
pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;

/// [`CHUNK_HEIGHT`] as a signed coordinate.
#[allow(clippy::cast_possible_wrap)]
pub const CHUNK_HEIGHT_I32: i32 = CHUNK_HEIGHT as i32;

/// Water fills columns whose surface is below this height.
pub const SEA_LEVEL: i32 = 30;

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Protocol version carried in `hello.clientVersion`.
pub const PROTOCOL_VERSION: u32 = 3;

/// Default server port for game traffic
pub const SERVER_PORT: u16 = 7777;

/// Tick rate (simulation steps per second)
pub const TICK_RATE: u32 = 20;

/// Fixed simulation step, in seconds.
#[allow(clippy::cast_precision_loss)]
pub const TICK_DT: f32 = 1.0 / TICK_RATE as f32;

/// Maximum players per room unless configured otherwise.
pub const MAX_PLAYERS: usize = 8;

// =============================================================================
// GAMEPLAY
// =============================================================================

/// Maximum distance from eye to target for mine/place/attack.
pub const REACH: f32 = 5.5;

/// Full player health.
pub const MAX_HEALTH: f32 = 20.0;

/// Number of hotbar slots.
pub const HOTBAR_SLOTS: usize = 9;

/// Largest stack of a stackable item.
pub const MAX_STACK: u32 = 64;

/// Below this height a player is respawned.
pub const VOID_FLOOR: f32 = -16.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_matches_dimensions() {
        assert_eq!(CHUNK_VOLUME, 16 * 96 * 16);
        assert!(SEA_LEVEL > 0 && SEA_LEVEL < CHUNK_HEIGHT_I32);
    }

    #[test]
    fn test_tick_dt() {
        assert!((TICK_DT - 0.05).abs() < 1e-6);
    }
}
