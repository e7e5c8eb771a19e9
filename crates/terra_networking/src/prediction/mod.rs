//! # Client-Side Prediction
//!
//! The local player moves the moment a key is pressed; the server's answer
//! arrives a round trip later and corrects the prediction.
//!
//! ## How It Works
//!
//! 1. Each frame the client simulates its own body with the shared physics
//! 2. The same intent goes to the server as an `input` tagged with a `seq`
//! 3. Snapshots echo the highest `seq` the server has simulated
//! 4. The client drops acknowledged inputs and compares positions
//!
//! ```text
//! Input:      [1] [2] [3] [4] [5]
//!              │   │   │   │   │
//! Prediction: [P1][P2][P3][P4][P5]
//!                      │
//! Snapshot:   lastInputSeq = 3, position S3
//!                      │
//! Reconcile:  |P5 - S3| ≤ 0.05  → keep
//!             |P5 - S3| > 3.0   → snap to S3
//!             otherwise         → move 30% of the way to S3
//! ```
//!
//! Unacknowledged inputs are not replayed on top of the server position.
//! While moving, the prediction runs a little ahead of each snapshot, so
//! small errors are normal and the blend absorbs them; once the player
//! stops, the two sides agree again.

use std::collections::VecDeque;

use terra_shared::{Vec3, MAX_HEALTH};

use crate::physics::{simulate_player, Body, MoveIntent, VoxelQuery};
use crate::protocol::{ClientMessage, InputFrame, PlayerState, MAX_INPUT_DT};

/// Errors at or below this distance are ignored.
pub const POSITION_TOLERANCE: f32 = 0.05;
/// Errors above this distance snap straight to the server position.
pub const SNAP_DISTANCE: f32 = 3.0;
/// Fraction of the error removed by one blend.
pub const BLEND_FACTOR: f32 = 0.3;

/// Most inputs kept while waiting for acknowledgement.
const INPUT_BUFFER_SIZE: usize = 128;

/// Sent inputs the server has not acknowledged yet, oldest first.
#[derive(Clone, Debug, Default)]
pub struct InputBuffer {
    inputs: VecDeque<InputFrame>,
}

impl InputBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { inputs: VecDeque::with_capacity(INPUT_BUFFER_SIZE) }
    }

    /// Adds an input, dropping the oldest once full.
    pub fn push(&mut self, frame: InputFrame) {
        if self.inputs.len() == INPUT_BUFFER_SIZE {
            self.inputs.pop_front();
        }
        self.inputs.push_back(frame);
    }

    /// Drops every input with `seq <= up_to`. Returns how many were dropped.
    pub fn acknowledge(&mut self, up_to: u32) -> usize {
        let before = self.inputs.len();
        while self.inputs.front().is_some_and(|f| f.seq <= up_to) {
            self.inputs.pop_front();
        }
        before - self.inputs.len()
    }

    /// Pending inputs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &InputFrame> {
        self.inputs.iter()
    }

    /// Number of pending inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Clears all inputs.
    pub fn clear(&mut self) {
        self.inputs.clear();
    }
}

/// Result of reconciliation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReconciliationResult {
    /// Prediction was within tolerance.
    NoCorrection,
    /// Moved part of the way toward the server position.
    Blend {
        /// Error before the blend.
        error: f32,
    },
    /// Jumped to the server position.
    Snap {
        /// Error before the snap.
        error: f32,
    },
}

/// Predicted state of the local player.
#[derive(Clone, Debug)]
pub struct Predictor {
    body: Body,
    yaw: f32,
    pitch: f32,
    health: f32,
    next_seq: u32,
    last_acked_seq: u32,
    inputs: InputBuffer,
}

impl Predictor {
    /// Starts predicting from `position`.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            body: Body::player(position),
            yaw: 0.0,
            pitch: 0.0,
            health: MAX_HEALTH,
            next_seq: 1,
            last_acked_seq: 0,
            inputs: InputBuffer::new(),
        }
    }

    /// Simulates one frame locally and returns the `input` message to send.
    ///
    /// `dt` is capped at the longest frame the server accepts. Returns
    /// `None` for a frame that is not positive and finite.
    pub fn predict(&mut self, intent: &MoveIntent, dt: f32, world: &impl VoxelQuery) -> Option<ClientMessage> {
        if !(dt.is_finite() && dt > 0.0) {
            return None;
        }
        let dt = dt.min(MAX_INPUT_DT);
        simulate_player(&mut self.body, intent, dt, world);
        self.yaw = intent.yaw;
        self.pitch = intent.pitch;

        let frame = InputFrame {
            seq: self.next_seq,
            dt,
            move_x: intent.move_x.clamp(-1.0, 1.0),
            move_z: intent.move_z.clamp(-1.0, 1.0),
            jump: intent.jump,
            sprint: intent.sprint,
            yaw: intent.yaw,
            pitch: intent.pitch.clamp(-90.0, 90.0),
        };
        self.next_seq += 1;
        self.inputs.push(frame);
        Some(ClientMessage::Input(frame))
    }

    /// Corrects the prediction against the server's view of this player.
    pub fn reconcile(&mut self, state: &PlayerState) -> ReconciliationResult {
        self.inputs.acknowledge(state.last_input_seq);
        self.last_acked_seq = self.last_acked_seq.max(state.last_input_seq);
        self.body.velocity = state.velocity;
        self.health = state.health;
        self.yaw = state.yaw;
        self.pitch = state.pitch;

        let error = self.body.position.distance(state.position);
        if error <= POSITION_TOLERANCE {
            ReconciliationResult::NoCorrection
        } else if error > SNAP_DISTANCE {
            self.body.position = state.position;
            ReconciliationResult::Snap { error }
        } else {
            self.body.position = self.body.position.lerp(state.position, BLEND_FACTOR);
            ReconciliationResult::Blend { error }
        }
    }

    /// Forgets pending inputs and restarts from `position` at rest.
    /// Sequence numbers keep counting.
    pub fn reset(&mut self, position: Vec3) {
        self.body.teleport(position);
        self.inputs.clear();
    }

    /// Predicted feet position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.body.position
    }

    /// Predicted velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.body.velocity
    }

    /// Predicted physics body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Last health reported by the server.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Heading and pitch in degrees.
    #[must_use]
    pub const fn look(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    /// Highest `seq` the server has acknowledged.
    #[must_use]
    pub const fn last_acked_seq(&self) -> u32 {
        self.last_acked_seq
    }

    /// Inputs still waiting for acknowledgement.
    #[must_use]
    pub const fn pending_inputs(&self) -> &InputBuffer {
        &self.inputs
    }
}
