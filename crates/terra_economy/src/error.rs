//! # Economy Error Types
//!
//! All errors that can occur in the inventory and crafting systems.

use terra_shared::ItemId;
use thiserror::Error;

/// Errors that can occur in the economy system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// Attempted to craft or spend with insufficient materials.
    #[error("insufficient materials: need {required} of {item:?}, have {available}")]
    InsufficientMaterials {
        /// The item that was missing.
        item: ItemId,
        /// The amount required.
        required: u32,
        /// The amount available.
        available: u32,
    },

    /// Recipe not found in the recipe book.
    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    /// Detected a cycle in the recipe graph (infinite resource generation).
    #[error("cycle detected in recipe graph at {0}")]
    CycleDetected(String),

    /// Hotbar has no room for the items.
    #[error("hotbar full: could not fit {amount} of {item:?}")]
    InventoryFull {
        /// Item being added.
        item: ItemId,
        /// Amount that did not fit.
        amount: u32,
    },

    /// Slot index outside the hotbar.
    #[error("invalid slot {0}")]
    InvalidSlot(usize),

    /// Invalid configuration file or recipe.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
