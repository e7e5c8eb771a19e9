//! # TERRA Shared
//!
//! Common types used by the world generator, the server and clients.
//!
//! ## CRITICAL RULE
//!
//! This crate performs no I/O and owns the coordinate mapping. Any code that
//! turns a world cell into a chunk key must call [`world_to_chunk_local`] or
//! [`ChunkCoord::from_block`]; re-deriving the math elsewhere is how chunk
//! borders drift apart between client and server.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod block;
pub mod constants;
pub mod coords;
pub mod item;
pub mod math;

pub use block::{Block, BlockProperties};
pub use constants::{
    CHUNK_HEIGHT, CHUNK_HEIGHT_I32, CHUNK_SIZE, CHUNK_SIZE_I32, CHUNK_VOLUME, HOTBAR_SLOTS,
    MAX_HEALTH, MAX_PLAYERS, MAX_STACK, PROTOCOL_VERSION, REACH, SEA_LEVEL, SERVER_PORT,
    TICK_DT, TICK_RATE, VOID_FLOOR,
};
pub use coords::{chunk_local_to_world, is_border, world_to_chunk_local, ChunkCoord, LocalPos};
pub use item::ItemId;
pub use math::{BlockPos, Vec3};
