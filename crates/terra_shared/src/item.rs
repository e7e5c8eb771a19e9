//! Item identifiers.
//!
//! The set is closed: anything else on the wire fails to decode.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::constants::MAX_STACK;

/// An item that can sit in a hotbar slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemId {
    /// Places [`Block::Grass`].
    Grass,
    /// Places [`Block::Dirt`].
    Dirt,
    /// Places [`Block::Stone`].
    Stone,
    /// Places [`Block::Sand`].
    Sand,
    /// Places [`Block::Log`].
    Log,
    /// Places [`Block::Leaves`].
    Leaves,
    /// Places [`Block::Planks`].
    Planks,
    /// Places [`Block::Cobblestone`].
    Cobblestone,
    /// Crafting intermediate.
    Stick,
    /// Mines stone twice as fast.
    WoodenPickaxe,
    /// Mines stone four times as fast.
    StonePickaxe,
}

impl ItemId {
    /// Block this item places, if any.
    #[must_use]
    pub const fn as_block(self) -> Option<Block> {
        match self {
            Self::Grass => Some(Block::Grass),
            Self::Dirt => Some(Block::Dirt),
            Self::Stone => Some(Block::Stone),
            Self::Sand => Some(Block::Sand),
            Self::Log => Some(Block::Log),
            Self::Leaves => Some(Block::Leaves),
            Self::Planks => Some(Block::Planks),
            Self::Cobblestone => Some(Block::Cobblestone),
            Self::Stick | Self::WoodenPickaxe | Self::StonePickaxe => None,
        }
    }

    /// Whether this item is a tool.
    #[must_use]
    pub const fn is_tool(self) -> bool {
        matches!(self, Self::WoodenPickaxe | Self::StonePickaxe)
    }

    /// Maximum count in a single slot.
    #[must_use]
    pub const fn max_stack(self) -> u32 {
        if self.is_tool() {
            1
        } else {
            MAX_STACK
        }
    }

    /// Mining speed multiplier when held against `block`.
    #[must_use]
    pub const fn mining_multiplier(self, block: Block) -> f32 {
        if !block.properties().pickaxe_effective {
            return 1.0;
        }
        match self {
            Self::WoodenPickaxe => 2.0,
            Self::StonePickaxe => 4.0,
            _ => 1.0,
        }
    }
}
