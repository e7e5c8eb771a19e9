//! # TERRA Networking
//!
//! Authoritative multiplayer server and client-side sync for TERRA.
//!
//! ## Architecture
//!
//! - **Protocol**: tagged JSON messages, one per line, range-checked on decode
//! - **Physics**: one movement implementation shared by server and client
//! - **Server**: single-threaded tick loop owning the world; tokio only
//!   moves bytes
//! - **Prediction**: the local player moves immediately and is corrected by
//!   snapshots
//! - **Interpolation**: everyone else glides toward their latest snapshot
//!
//! ## Security Model
//!
//! ```text
//! CLIENT                                   SERVER
//!   |                                         |
//!   |--- action_mine {target} --------------->|
//!   |                                         | <- reach, hardness, rate limit
//!   |<-- snapshot {changedBlocks} ------------|
//!   |<-- inventory_update --------------------|
//!   |                                         |
//! ```
//!
//! The client never decides outcomes. Every action is re-checked against
//! authoritative state, and rejected actions simply do not happen.
//!
//! ## Example
//!
//! ```rust,ignore
//! use terra_networking::server::{transport, ServerConfig};
//!
//! let config = ServerConfig::load(None)?;
//! transport::run(config)?; // Blocks until Ctrl-C, then saves the world
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod interpolation;
pub mod persistence;
pub mod physics;
pub mod prediction;
pub mod protocol;
pub mod server;

// Re-exports for convenience
pub use client::{ClientSession, ClientState, LocalSession};
pub use interpolation::{EntityKind, RemoteEntities, RemoteEntity};
pub use persistence::{PlayerRecord, WorldMeta};
pub use physics::{Body, MoveIntent, VoxelQuery};
pub use prediction::{InputBuffer, Predictor, ReconciliationResult};
pub use protocol::{ClientMessage, InputFrame, ProtocolError, ServerMessage, Snapshot};
pub use server::{ConnectionId, GameServer, ServerConfig, ServerError};
