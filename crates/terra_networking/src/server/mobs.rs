//! # Hostile Mobs
//!
//! Mobs use the player physics. Each tick a mob walks toward the nearest
//! player in aggro range, hops when a wall stops it on the ground, and hits
//! anyone close enough once its cooldown has run out. Mobs that fall below
//! the void floor are removed.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use rand::Rng;

use terra_procedural::WorldStore;
use terra_shared::{Block, ChunkCoord, Vec3, VOID_FLOOR};

use crate::physics::{step_body, Body, VoxelQuery};
use crate::protocol::MobState;

/// Ticks between spawn attempts.
pub const MOB_SPAWN_INTERVAL_TICKS: u64 = 100;
/// Most mobs alive at once.
pub const MOB_CAP: usize = 12;
/// Spawn distance band around the chosen player.
pub const MOB_SPAWN_MIN_DISTANCE: f32 = 12.0;
/// Spawn distance band around the chosen player.
pub const MOB_SPAWN_MAX_DISTANCE: f32 = 24.0;
/// Starting health.
pub const MOB_MAX_HEALTH: f32 = 10.0;
/// Players closer than this are chased.
pub const MOB_AGGRO_RANGE: f32 = 16.0;
/// Walking speed while chasing.
pub const MOB_SPEED: f32 = 3.0;
/// Players closer than this (feet to feet) get hit.
pub const MOB_ATTACK_RANGE: f32 = 1.6;
/// Damage per hit.
pub const MOB_DAMAGE: f32 = 2.0;
/// Ticks between hits from one mob.
pub const MOB_ATTACK_COOLDOWN_TICKS: u64 = 20;
/// Box width.
pub const MOB_WIDTH: f32 = 0.6;
/// Box height.
pub const MOB_HEIGHT: f32 = 1.8;

/// A hostile mob.
#[derive(Clone, Debug)]
pub struct Mob {
    /// Entity id.
    pub id: u32,
    /// Physics body.
    pub body: Body,
    /// Heading in degrees.
    pub yaw: f32,
    /// Current health.
    pub health: f32,
    /// Tick of the last hit dealt.
    pub last_attack_tick: Option<u64>,
    /// A wall stopped the last step.
    pub blocked: bool,
}

impl Mob {
    /// A full-health mob at `position`.
    #[must_use]
    pub const fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            body: Body::new(position, MOB_WIDTH, MOB_HEIGHT),
            yaw: 0.0,
            health: MOB_MAX_HEALTH,
            last_attack_tick: None,
            blocked: false,
        }
    }

    /// Middle of the box, the target of player attacks.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.body.position + Vec3::new(0.0, MOB_HEIGHT / 2.0, 0.0)
    }

    /// Wire form for snapshots.
    #[must_use]
    pub fn state(&self) -> MobState {
        MobState {
            id: self.id,
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.yaw,
            health: self.health,
        }
    }
}

/// A hit dealt this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MobHit {
    /// Attacker.
    pub mob_id: u32,
    /// Victim.
    pub player_id: u32,
    /// Damage dealt.
    pub damage: f32,
}

/// Picks a random standable column in the spawn band around `around`.
///
/// The column must be loaded, its top solid block must not be under water,
/// and the two cells above it must be air.
pub fn find_spawn_point(world: &WorldStore, rng: &mut impl Rng, around: Vec3) -> Option<Vec3> {
    let angle = rng.gen_range(0.0..TAU);
    let distance = rng.gen_range(MOB_SPAWN_MIN_DISTANCE..MOB_SPAWN_MAX_DISTANCE);
    #[allow(clippy::cast_possible_truncation)]
    let (x, z) = (
        (around.x + angle.cos() * distance).floor() as i32,
        (around.z + angle.sin() * distance).floor() as i32,
    );
    if !world.contains(ChunkCoord::from_block(x, z)) {
        return None;
    }
    let ground = world.highest_solid_y(x, z)?;
    let headroom = (ground + 1..=ground + 2).all(|y| world.get_block(x, y, z) == Block::Air);
    if !headroom {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let feet = Vec3::new(x as f32 + 0.5, (ground + 1) as f32, z as f32 + 0.5);
    Some(feet)
}

/// Runs AI and physics for every mob. Returns the hits dealt; mobs that fell
/// out of the world are removed and their ids returned too.
pub fn update_mobs(
    mobs: &mut BTreeMap<u32, Mob>,
    players: &[(u32, Vec3)],
    world: &impl VoxelQuery,
    tick: u64,
    dt: f32,
) -> (Vec<MobHit>, Vec<u32>) {
    let mut hits = Vec::new();
    for mob in mobs.values_mut() {
        let nearest = players
            .iter()
            .map(|&(id, pos)| (id, pos, pos.distance_squared(mob.body.position)))
            .filter(|&(_, _, d2)| d2 <= MOB_AGGRO_RANGE * MOB_AGGRO_RANGE)
            .min_by(|a, b| a.2.total_cmp(&b.2));

        let mut desired = Vec3::ZERO;
        if let Some((_, target, _)) = nearest {
            let dx = target.x - mob.body.position.x;
            let dz = target.z - mob.body.position.z;
            let len = (dx * dx + dz * dz).sqrt();
            if len > 0.1 {
                desired = Vec3::new(dx / len * MOB_SPEED, 0.0, dz / len * MOB_SPEED);
                mob.yaw = dx.atan2(dz).to_degrees();
            }
        }

        let hop = mob.blocked && mob.body.on_ground;
        mob.blocked = step_body(&mut mob.body, desired, hop, dt, world).blocked_horizontal;

        if let Some((player_id, target, _)) = nearest {
            let ready = mob
                .last_attack_tick
                .map_or(true, |last| tick.saturating_sub(last) >= MOB_ATTACK_COOLDOWN_TICKS);
            if ready && target.distance(mob.body.position) <= MOB_ATTACK_RANGE {
                mob.last_attack_tick = Some(tick);
                hits.push(MobHit { mob_id: mob.id, player_id, damage: MOB_DAMAGE });
            }
        }
    }

    let fallen: Vec<u32> = mobs
        .values()
        .filter(|m| m.body.position.y < VOID_FLOOR)
        .map(|m| m.id)
        .collect();
    for id in &fallen {
        mobs.remove(id);
    }
    (hits, fallen)
}
