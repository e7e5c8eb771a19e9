//! # TERRA Economy
//!
//! Hotbar inventory and crafting for the authoritative server.
//!
//! ## Design Principles
//!
//! 1. **Transactional** - a failed add, remove or craft changes nothing
//! 2. **Closed item set** - items are [`terra_shared::ItemId`] values
//! 3. **External configuration** - recipes can be loaded from TOML
//!
//! ## Thread Safety
//!
//! Called from the server tick thread only. Client-side copies of the
//! hotbar are display state overwritten by `inventory_update`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use terra_economy::{Hotbar, RecipeBook};
//! use terra_shared::ItemId;
//!
//! let book = RecipeBook::builtin();
//! let mut hotbar = Hotbar::new();
//! hotbar.add(ItemId::Log, 1)?;
//! book.craft(&mut hotbar, "planks")?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod crafting;
pub mod error;
pub mod inventory;

pub use crafting::{Recipe, RecipeBook, RecipeItem};
pub use error::{EconomyError, EconomyResult};
pub use inventory::{Hotbar, ItemStack};
