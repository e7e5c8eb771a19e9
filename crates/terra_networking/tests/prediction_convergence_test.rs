//! # Prediction Convergence Test
//!
//! A client session and a server exchange messages in lockstep, one input
//! per tick. With nothing lost in transit the prediction must agree with
//! every snapshot, so no correction is ever applied.

use std::sync::Arc;

use terra_networking::prediction::POSITION_TOLERANCE;
use terra_networking::server::{ConnectionId, GameServer, OutgoingAction, ServerConfig};
use terra_networking::{ClientSession, ClientState, MoveIntent, ReconciliationResult};
use terra_procedural::MemoryStore;

const CONNECTION: ConnectionId = ConnectionId(1);

struct Harness {
    server: GameServer,
    client: ClientSession,
    corrections: Vec<ReconciliationResult>,
}

impl Harness {
    fn new() -> Self {
        let config = ServerConfig { view_distance: 2, ..ServerConfig::default() };
        let mut server = GameServer::new(config, Arc::new(MemoryStore::new())).unwrap();
        let mut client = ClientSession::new("walker", "lobby");
        server.connect(CONNECTION);
        server.handle_message(CONNECTION, client.hello());
        let mut harness = Self { server, client, corrections: Vec::new() };
        harness.pump();
        harness
    }

    /// Delivers everything the server queued for our connection.
    fn pump(&mut self) {
        for outgoing in self.server.drain_outbox() {
            if outgoing.connection != CONNECTION {
                continue;
            }
            if let OutgoingAction::Send(message) = outgoing.action {
                let is_snapshot = matches!(message, terra_networking::ServerMessage::Snapshot(_));
                self.client.handle_message(message);
                if is_snapshot {
                    if let Some(result) = self.client.last_reconciliation() {
                        self.corrections.push(result);
                    }
                }
            }
        }
    }

    fn step(&mut self, intent: &MoveIntent) {
        let dt = self.server.config().tick_dt();
        if let Some(input) = self.client.predict(intent, dt) {
            self.server.handle_message(CONNECTION, input);
        }
        self.server.tick();
        self.pump();
    }

    fn error(&self) -> f32 {
        let predicted = self.client.predictor().expect("predictor").position();
        let authoritative = self.server.player_for(CONNECTION).expect("player").body.position;
        predicted.distance(authoritative)
    }
}

#[test]
fn test_lockstep_prediction_never_corrects() {
    let mut h = Harness::new();
    assert_eq!(h.client.state(), ClientState::Joined);

    let idle = MoveIntent { yaw: 30.0, ..MoveIntent::default() };
    for _ in 0..40 {
        h.step(&idle);
    }
    for i in 0..60 {
        let jump = i % 15 == 14;
        h.step(&MoveIntent { move_z: 1.0, jump, ..idle });
    }
    for _ in 0..20 {
        h.step(&idle);
    }

    assert!(h.error() <= POSITION_TOLERANCE, "error {}", h.error());
    assert!(!h.corrections.is_empty());
    assert!(h
        .corrections
        .iter()
        .all(|c| *c == ReconciliationResult::NoCorrection));
    assert!(h.client.take_errors().is_empty());
}

#[test]
fn test_acknowledged_inputs_leave_the_buffer() {
    let mut h = Harness::new();
    let walk = MoveIntent { move_x: 1.0, ..MoveIntent::default() };
    for _ in 0..10 {
        h.step(&walk);
    }
    // The first two ticks run before any snapshot placed the player, so
    // eight inputs went out and the tick-10 snapshot covers all of them.
    let predictor = h.client.predictor().expect("predictor");
    assert_eq!(predictor.last_acked_seq(), 8);
    assert!(predictor.pending_inputs().is_empty());
}
