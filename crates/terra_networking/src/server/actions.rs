//! # Player Actions
//!
//! Every action is validated against authoritative state before it touches
//! anything. A failed check is not an error the client needs to hear about:
//! the action is dropped, and the next snapshot or inventory update shows
//! the client what really happened.
//!
//! ## Rate limits
//!
//! Both limits count server ticks, not wall time:
//!
//! - mining: `ceil(hardness / tool_multiplier * tick_rate)` ticks between
//!   successful mines
//! - attacking: [`ATTACK_COOLDOWN_TICKS`] between successful hits

use serde_json::json;
use tracing::debug;

use terra_shared::{Block, BlockPos, ChunkCoord, Vec3, CHUNK_HEIGHT_I32, REACH};

use super::state::Player;
use super::GameServer;
use crate::protocol::{BlockChange, EventKind};

/// Ticks between successful attacks by one player.
pub const ATTACK_COOLDOWN_TICKS: u64 = 10;
/// Damage of one player hit.
pub const ATTACK_DAMAGE: f32 = 4.0;

/// Ticks a block takes to mine with the given tool multiplier.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn mining_interval_ticks(hardness: f32, multiplier: f32, tick_rate: u32) -> u64 {
    let ticks = (hardness / multiplier.max(1.0) * tick_rate as f32).ceil();
    ticks.max(1.0) as u64
}

fn within_reach(player: &Player, point: Vec3) -> bool {
    player.body.eye().distance_squared(point) <= REACH * REACH
}

impl GameServer {
    fn record_change(&mut self, pos: BlockPos, block: Block) {
        self.changed_blocks.push(BlockChange { x: pos.x, y: pos.y, z: pos.z, block });
    }

    pub(super) fn mine(&mut self, player_id: u32, target: BlockPos) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        if !within_reach(player, target.center()) {
            debug!(player_id, ?target, "mine out of reach");
            return;
        }
        let block = self.world.get_block(target.x, target.y, target.z);
        let Some(hardness) = block.hardness() else {
            return;
        };
        let multiplier = player.hotbar.held().map_or(1.0, |s| s.item.mining_multiplier(block));
        let interval = mining_interval_ticks(hardness, multiplier, self.config.tick_rate);
        if let Some(last) = player.last_mine_tick {
            if self.tick.saturating_sub(last) < interval {
                debug!(player_id, ?target, interval, "mining too fast");
                return;
            }
        }

        if !self.world.set_block(target.x, target.y, target.z, Block::Air) {
            return;
        }
        self.record_change(target, Block::Air);

        let tick = self.tick;
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.last_mine_tick = Some(tick);
        if let Some(item) = block.drop() {
            if let Err(e) = player.hotbar.add(item, 1) {
                debug!(player_id, error = %e, "drop lost");
            }
        }
        self.send_inventory(player_id);
    }

    pub(super) fn place(&mut self, player_id: u32, target: BlockPos, normal: BlockPos, slot: usize) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let cell = target.offset(normal);
        if !within_reach(player, cell.center()) {
            debug!(player_id, ?cell, "place out of reach");
            return;
        }
        let Some(block) = player.hotbar.get(slot).and_then(|s| s.item.as_block()) else {
            return;
        };
        if !(0..CHUNK_HEIGHT_I32).contains(&cell.y)
            || !self.world.contains(ChunkCoord::from_block(cell.x, cell.z))
            || !self.world.get_block(cell.x, cell.y, cell.z).is_replaceable()
        {
            return;
        }
        let occupied = self.players.values().any(|p| p.body.aabb().intersects_cell(cell))
            || self.mobs.values().any(|m| m.body.aabb().intersects_cell(cell));
        if occupied {
            debug!(player_id, ?cell, "place blocked by an entity");
            return;
        }

        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if player.hotbar.select(slot).is_err() || player.hotbar.take_one(slot).is_err() {
            return;
        }
        self.world.set_block(cell.x, cell.y, cell.z, block);
        self.record_change(cell, block);
        self.send_inventory(player_id);
    }

    pub(super) fn craft(&mut self, player_id: u32, recipe_id: &str) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        match self.recipes.craft(&mut player.hotbar, recipe_id) {
            Ok(_) => self.send_inventory(player_id),
            Err(e) => debug!(player_id, recipe_id, error = %e, "craft refused"),
        }
    }

    pub(super) fn attack(&mut self, player_id: u32, mob_id: u32) {
        let (Some(player), Some(mob)) = (self.players.get(&player_id), self.mobs.get(&mob_id)) else {
            return;
        };
        if !within_reach(player, mob.center()) {
            debug!(player_id, mob_id, "attack out of reach");
            return;
        }
        let tick = self.tick;
        if player
            .last_attack_tick
            .is_some_and(|last| tick.saturating_sub(last) < ATTACK_COOLDOWN_TICKS)
        {
            return;
        }

        if let Some(player) = self.players.get_mut(&player_id) {
            player.last_attack_tick = Some(tick);
        }
        let Some(mob) = self.mobs.get_mut(&mob_id) else {
            return;
        };
        mob.health -= ATTACK_DAMAGE;
        if mob.health <= 0.0 {
            self.mobs.remove(&mob_id);
            debug!(player_id, mob_id, "mob killed");
            self.broadcast_event(
                EventKind::MobKilled,
                json!({ "mobId": mob_id, "playerId": player_id }),
            );
        }
    }

    pub(super) fn select_slot(&mut self, player_id: u32, slot: usize) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if player.hotbar.select(slot).is_ok() {
            self.send_inventory(player_id);
        }
    }
}
