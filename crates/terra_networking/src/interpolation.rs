//! # Remote Entity Interpolation
//!
//! Other players and mobs are never predicted. Each snapshot sets where an
//! entity should be; every rendered frame moves its visible position part of
//! the way there:
//!
//! ```text
//! rendered += (target - rendered) * (1 - exp(-rate * dt))
//! ```
//!
//! The factor depends only on elapsed time, so the glide looks the same at
//! any frame rate. An entity that jumped too far (respawn, teleport) is
//! placed directly instead of sliding across the map.

use std::collections::BTreeMap;

use terra_shared::Vec3;

use crate::protocol::Snapshot;

/// Convergence rate, per second.
pub const INTERPOLATION_RATE: f32 = 12.0;
/// Targets farther than this from the rendered position are jumped to.
pub const TELEPORT_DISTANCE: f32 = 8.0;

/// Which id space an entity lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Another player.
    Player,
    /// A mob.
    Mob,
}

/// Render state of one remote entity.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteEntity {
    /// Player or mob id.
    pub id: u32,
    /// Id space.
    pub kind: EntityKind,
    /// Position to draw.
    pub rendered: Vec3,
    /// Latest authoritative position.
    pub target: Vec3,
    /// Latest heading in degrees.
    pub yaw: f32,
    /// Latest health.
    pub health: f32,
    /// Display name for players.
    pub nickname: Option<String>,
}

/// Remote players and mobs, keyed by kind and id.
#[derive(Clone, Debug, Default)]
pub struct RemoteEntities {
    entities: BTreeMap<(EntityKind, u32), RemoteEntity>,
}

impl RemoteEntities {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a snapshot. The local player (`local_id`) is skipped; entities
    /// missing from the snapshot are dropped.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, local_id: Option<u32>) {
        let mut seen = Vec::with_capacity(snapshot.players.len() + snapshot.mobs.len());
        for player in snapshot.players.iter().filter(|p| Some(p.id) != local_id) {
            let entity = self.upsert(EntityKind::Player, player.id, player.position);
            entity.yaw = player.yaw;
            entity.health = player.health;
            entity.nickname = Some(player.nickname.clone());
            seen.push((EntityKind::Player, player.id));
        }
        for mob in &snapshot.mobs {
            let entity = self.upsert(EntityKind::Mob, mob.id, mob.position);
            entity.yaw = mob.yaw;
            entity.health = mob.health;
            seen.push((EntityKind::Mob, mob.id));
        }
        self.entities.retain(|key, _| seen.contains(key));
    }

    fn upsert(&mut self, kind: EntityKind, id: u32, target: Vec3) -> &mut RemoteEntity {
        let entity = self.entities.entry((kind, id)).or_insert_with(|| RemoteEntity {
            id,
            kind,
            rendered: target,
            target,
            yaw: 0.0,
            health: 0.0,
            nickname: None,
        });
        entity.target = target;
        if entity.rendered.distance(target) > TELEPORT_DISTANCE {
            entity.rendered = target;
        }
        entity
    }

    /// Moves every rendered position toward its target.
    pub fn advance(&mut self, dt: f32) {
        let t = 1.0 - (-INTERPOLATION_RATE * dt.max(0.0)).exp();
        for entity in self.entities.values_mut() {
            entity.rendered = entity.rendered.lerp(entity.target, t);
        }
    }

    /// One entity.
    #[must_use]
    pub fn get(&self, kind: EntityKind, id: u32) -> Option<&RemoteEntity> {
        self.entities.get(&(kind, id))
    }

    /// All entities, players first, then by id.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MobState, PlayerState};

    fn player(id: u32, position: Vec3) -> PlayerState {
        PlayerState {
            id,
            nickname: format!("p{id}"),
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            health: 20.0,
            last_input_seq: 0,
        }
    }

    fn mob(id: u32, position: Vec3) -> MobState {
        MobState { id, position, velocity: Vec3::ZERO, yaw: 0.0, health: 10.0 }
    }

    #[test]
    fn test_local_player_is_skipped() {
        let snapshot = Snapshot {
            tick: 1,
            players: vec![player(1, Vec3::ZERO), player(2, Vec3::ZERO)],
            mobs: vec![mob(1, Vec3::ZERO)],
            changed_blocks: Vec::new(),
        };
        let mut remotes = RemoteEntities::new();
        remotes.apply_snapshot(&snapshot, Some(1));
        assert_eq!(remotes.len(), 2);
        assert!(remotes.get(EntityKind::Player, 1).is_none());
        assert_eq!(remotes.get(EntityKind::Player, 2).and_then(|e| e.nickname.as_deref()), Some("p2"));
        assert!(remotes.get(EntityKind::Mob, 1).is_some());
    }

    #[test]
    fn test_glides_toward_target() {
        let mut remotes = RemoteEntities::new();
        let at = |x| Snapshot { tick: 1, players: vec![player(2, Vec3::new(x, 0.0, 0.0))], ..Snapshot::default() };
        remotes.apply_snapshot(&at(0.0), Some(1));
        remotes.apply_snapshot(&at(2.0), Some(1));

        let before = remotes.get(EntityKind::Player, 2).map(|e| e.rendered.x);
        assert_eq!(before, Some(0.0));

        remotes.advance(0.05);
        let x = remotes.get(EntityKind::Player, 2).map_or(0.0, |e| e.rendered.x);
        let expected = 2.0 * (1.0 - (-INTERPOLATION_RATE * 0.05f32).exp());
        assert!((x - expected).abs() < 1e-4);

        for _ in 0..100 {
            remotes.advance(0.05);
        }
        let x = remotes.get(EntityKind::Player, 2).map_or(0.0, |e| e.rendered.x);
        assert!((x - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_far_jumps_teleport_and_missing_entities_drop() {
        let mut remotes = RemoteEntities::new();
        let snapshot = Snapshot { tick: 1, mobs: vec![mob(5, Vec3::ZERO)], ..Snapshot::default() };
        remotes.apply_snapshot(&snapshot, None);
        let snapshot = Snapshot { tick: 2, mobs: vec![mob(5, Vec3::new(50.0, 0.0, 0.0))], ..Snapshot::default() };
        remotes.apply_snapshot(&snapshot, None);
        assert_eq!(remotes.get(EntityKind::Mob, 5).map(|e| e.rendered.x), Some(50.0));

        remotes.apply_snapshot(&Snapshot::default(), None);
        assert!(remotes.is_empty());
    }
}
