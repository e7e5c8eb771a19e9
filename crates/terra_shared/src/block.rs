//! # Block Table
//!
//! Block codes are the `u16` values stored in chunk buffers and sent on the
//! wire. The property table is static data: hardness in seconds at bare
//! hand, solidity for collision, and the item dropped when mined.

use serde::{Deserialize, Serialize};

use crate::item::ItemId;

/// A block type. The discriminant is the persisted code.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    /// Empty space.
    #[default]
    Air = 0,
    /// Grass-topped soil.
    Grass = 1,
    /// Soil.
    Dirt = 2,
    /// Natural stone.
    Stone = 3,
    /// Beach and seabed sand.
    Sand = 4,
    /// Still water. Not solid, not minable.
    Water = 5,
    /// World floor. Unbreakable.
    Bedrock = 6,
    /// Tree trunk.
    Log = 7,
    /// Tree canopy.
    Leaves = 8,
    /// Crafted wood.
    Planks = 9,
    /// Mined stone.
    Cobblestone = 10,
}

/// Static properties of a block type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockProperties {
    /// Seconds to mine at bare hand; `None` means unbreakable.
    pub hardness: Option<f32>,
    /// Whether entities collide with it.
    pub solid: bool,
    /// Item granted when mined.
    pub drop: Option<ItemId>,
    /// Whether pickaxes speed up mining it.
    pub pickaxe_effective: bool,
}

const fn props(
    hardness: Option<f32>,
    solid: bool,
    drop: Option<ItemId>,
    pickaxe_effective: bool,
) -> BlockProperties {
    BlockProperties { hardness, solid, drop, pickaxe_effective }
}

/// Property table indexed by block code.
const PROPERTIES: [BlockProperties; 11] = [
    props(None, false, None, false),                              // air
    props(Some(0.6), true, Some(ItemId::Dirt), false),            // grass
    props(Some(0.5), true, Some(ItemId::Dirt), false),            // dirt
    props(Some(1.5), true, Some(ItemId::Cobblestone), true),      // stone
    props(Some(0.5), true, Some(ItemId::Sand), false),            // sand
    props(None, false, None, false),                              // water
    props(None, true, None, false),                               // bedrock
    props(Some(2.0), true, Some(ItemId::Log), false),             // log
    props(Some(0.2), true, Some(ItemId::Leaves), false),          // leaves
    props(Some(2.0), true, Some(ItemId::Planks), false),          // planks
    props(Some(2.0), true, Some(ItemId::Cobblestone), true),      // cobblestone
];

impl Block {
    /// All block types in code order.
    pub const ALL: [Self; 11] = [
        Self::Air,
        Self::Grass,
        Self::Dirt,
        Self::Stone,
        Self::Sand,
        Self::Water,
        Self::Bedrock,
        Self::Log,
        Self::Leaves,
        Self::Planks,
        Self::Cobblestone,
    ];

    /// Persisted code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Block for a code, `None` if unknown.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        if (code as usize) < Self::ALL.len() {
            Some(Self::ALL[code as usize])
        } else {
            None
        }
    }

    /// Static properties.
    #[inline]
    #[must_use]
    pub const fn properties(self) -> BlockProperties {
        PROPERTIES[self as usize]
    }

    /// Whether entities collide with this block.
    #[inline]
    #[must_use]
    pub const fn is_solid(self) -> bool {
        self.properties().solid
    }

    /// Whether this cell can be replaced by a placed block.
    #[inline]
    #[must_use]
    pub const fn is_replaceable(self) -> bool {
        matches!(self, Self::Air | Self::Water)
    }

    /// Seconds to mine at bare hand, `None` if unbreakable.
    #[inline]
    #[must_use]
    pub const fn hardness(self) -> Option<f32> {
        self.properties().hardness
    }

    /// Item granted when mined.
    #[inline]
    #[must_use]
    pub const fn drop(self) -> Option<ItemId> {
        self.properties().drop
    }
}
