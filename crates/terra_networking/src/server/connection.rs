//! # Connection Management
//!
//! A connection is whatever the transport hands the server: an id, a state,
//! nothing else. Sockets live in the transport; the simulation only ever sees
//! [`ConnectionId`]s and pushes [`Outgoing`] entries for the transport to
//! deliver.
//!
//! ```text
//! connect ──► Unjoined ──hello ok──► Joined { player_id }
//!                │                        │
//!                └─hello rejected─► closed  └─disconnect─► persisted, removed
//! ```

use std::fmt;

use crate::protocol::ServerMessage;

/// Transport-assigned connection identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Session state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for `hello`.
    Unjoined,
    /// Admitted as a player.
    Joined {
        /// Player entity id.
        player_id: u32,
    },
}

/// Server-side record of a connection.
#[derive(Clone, Debug)]
pub struct ClientConnection {
    /// Connection id.
    pub id: ConnectionId,
    /// Session state.
    pub state: ConnectionState,
    /// Messages rejected as malformed.
    pub bad_messages: u32,
}

impl ClientConnection {
    /// A fresh, unjoined connection.
    #[must_use]
    pub const fn new(id: ConnectionId) -> Self {
        Self { id, state: ConnectionState::Unjoined, bad_messages: 0 }
    }

    /// Player id once joined.
    #[must_use]
    pub const fn player_id(&self) -> Option<u32> {
        match self.state {
            ConnectionState::Joined { player_id } => Some(player_id),
            ConnectionState::Unjoined => None,
        }
    }
}

/// What the transport should do for a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum OutgoingAction {
    /// Deliver a message.
    Send(ServerMessage),
    /// Flush pending messages, then close the socket.
    Close,
}

/// One entry of the server outbox.
#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    /// Target connection.
    pub connection: ConnectionId,
    /// What to do.
    pub action: OutgoingAction,
}
