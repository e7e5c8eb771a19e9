//! # Hotbar
//!
//! Nine ordered slots, each empty or holding one item type with a count,
//! plus the selected slot. Mutations are all-or-nothing: a failed `add` or
//! `remove` leaves the hotbar unchanged.

use serde::{Deserialize, Serialize};
use terra_shared::{ItemId, HOTBAR_SLOTS};

use crate::error::{EconomyError, EconomyResult};

/// A stack of items in a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type.
    pub item: ItemId,
    /// Number of items (never zero in a slot).
    pub count: u32,
}

impl ItemStack {
    /// Creates a new item stack.
    #[inline]
    #[must_use]
    pub const fn new(item: ItemId, count: u32) -> Self {
        Self { item, count }
    }
}

/// The player's hotbar.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotbar {
    slots: [Option<ItemStack>; HOTBAR_SLOTS],
    selected: usize,
}

impl Hotbar {
    /// Creates an empty hotbar with slot 0 selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a hotbar from stored slots.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero or over-stacked counts and
    /// `InvalidSlot` for a selected index outside the hotbar.
    pub fn from_slots(slots: [Option<ItemStack>; HOTBAR_SLOTS], selected: usize) -> EconomyResult<Self> {
        if selected >= HOTBAR_SLOTS {
            return Err(EconomyError::InvalidSlot(selected));
        }
        for stack in slots.iter().flatten() {
            if stack.count == 0 || stack.count > stack.item.max_stack() {
                return Err(EconomyError::InvalidConfig(format!(
                    "bad stack of {} {:?}",
                    stack.count, stack.item
                )));
            }
        }
        Ok(Self { slots, selected })
    }

    /// All slots in order.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> &[Option<ItemStack>; HOTBAR_SLOTS] {
        &self.slots
    }

    /// Contents of a slot.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).copied().flatten()
    }

    /// Selected slot index.
    #[inline]
    #[must_use]
    pub const fn selected(&self) -> usize {
        self.selected
    }

    /// Contents of the selected slot.
    #[inline]
    #[must_use]
    pub fn held(&self) -> Option<ItemStack> {
        self.get(self.selected)
    }

    /// Selects a slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` if `slot` is outside the hotbar.
    pub fn select(&mut self, slot: usize) -> EconomyResult<()> {
        if slot >= HOTBAR_SLOTS {
            return Err(EconomyError::InvalidSlot(slot));
        }
        self.selected = slot;
        Ok(())
    }

    /// Total count of an item across all slots.
    #[must_use]
    pub fn count_item(&self, item: ItemId) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item == item)
            .map(|s| s.count)
            .sum()
    }

    /// Adds items, topping up existing stacks first, then empty slots.
    ///
    /// # Errors
    ///
    /// Returns `InventoryFull` if everything does not fit; nothing is added.
    pub fn add(&mut self, item: ItemId, count: u32) -> EconomyResult<()> {
        let snapshot = self.slots;
        let max = item.max_stack();
        let mut remaining = count;

        for stack in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if stack.item == item && stack.count < max {
                let moved = (max - stack.count).min(remaining);
                stack.count += moved;
                remaining -= moved;
            }
        }

        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(max);
                *slot = Some(ItemStack::new(item, moved));
                remaining -= moved;
            }
        }

        if remaining > 0 {
            self.slots = snapshot;
            return Err(EconomyError::InventoryFull { item, amount: remaining });
        }
        Ok(())
    }

    /// Removes items from wherever they are, earliest slots first.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientMaterials` if there are not enough; nothing is
    /// removed.
    pub fn remove(&mut self, item: ItemId, count: u32) -> EconomyResult<()> {
        let available = self.count_item(item);
        if available < count {
            return Err(EconomyError::InsufficientMaterials { item, required: count, available });
        }

        let mut remaining = count;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if let Some(stack) = slot {
                if stack.item == item {
                    let taken = stack.count.min(remaining);
                    stack.count -= taken;
                    remaining -= taken;
                    if stack.count == 0 {
                        *slot = None;
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes one item from a specific slot and returns its type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` for an empty or out-of-range slot.
    pub fn take_one(&mut self, slot: usize) -> EconomyResult<ItemId> {
        let entry = self.slots.get_mut(slot).ok_or(EconomyError::InvalidSlot(slot))?;
        let stack = entry.as_mut().ok_or(EconomyError::InvalidSlot(slot))?;
        let item = stack.item;
        stack.count -= 1;
        if stack.count == 0 {
            *entry = None;
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_items() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Dirt, 10).unwrap();
        assert_eq!(bar.count_item(ItemId::Dirt), 10);
        assert_eq!(bar.get(0), Some(ItemStack::new(ItemId::Dirt, 10)));
    }

    #[test]
    fn test_add_stacking() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Dirt, 60).unwrap();
        bar.add(ItemId::Dirt, 10).unwrap();
        assert_eq!(bar.get(0), Some(ItemStack::new(ItemId::Dirt, 64)));
        assert_eq!(bar.get(1), Some(ItemStack::new(ItemId::Dirt, 6)));
    }

    #[test]
    fn test_tools_do_not_stack() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::WoodenPickaxe, 2).unwrap();
        assert_eq!(bar.get(0), Some(ItemStack::new(ItemId::WoodenPickaxe, 1)));
        assert_eq!(bar.get(1), Some(ItemStack::new(ItemId::WoodenPickaxe, 1)));
    }

    #[test]
    fn test_full_hotbar_is_untouched() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Stone, 64 * 8 + 60).unwrap();
        let before = bar.clone();
        let err = bar.add(ItemId::Stone, 10).unwrap_err();
        assert_eq!(err, EconomyError::InventoryFull { item: ItemId::Stone, amount: 6 });
        assert_eq!(bar, before);
    }

    #[test]
    fn test_remove_items() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Planks, 70).unwrap();
        bar.remove(ItemId::Planks, 66).unwrap();
        assert_eq!(bar.count_item(ItemId::Planks), 4);
        assert_eq!(bar.get(0), None);
        assert_eq!(bar.get(1), Some(ItemStack::new(ItemId::Planks, 4)));
    }

    #[test]
    fn test_remove_insufficient() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Log, 2).unwrap();
        assert!(matches!(
            bar.remove(ItemId::Log, 3),
            Err(EconomyError::InsufficientMaterials { available: 2, .. })
        ));
        assert_eq!(bar.count_item(ItemId::Log), 2);
    }

    #[test]
    fn test_take_one_and_select() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Sand, 1).unwrap();
        bar.select(0).unwrap();
        assert_eq!(bar.take_one(0), Ok(ItemId::Sand));
        assert_eq!(bar.held(), None);
        assert_eq!(bar.take_one(0), Err(EconomyError::InvalidSlot(0)));
        assert_eq!(bar.select(9), Err(EconomyError::InvalidSlot(9)));
    }

    #[test]
    fn test_from_slots_validates() {
        let mut slots = [None; HOTBAR_SLOTS];
        slots[2] = Some(ItemStack::new(ItemId::StonePickaxe, 2));
        assert!(Hotbar::from_slots(slots, 0).is_err());
        slots[2] = Some(ItemStack::new(ItemId::StonePickaxe, 1));
        assert!(Hotbar::from_slots(slots, 9).is_err());
        let bar = Hotbar::from_slots(slots, 2).unwrap();
        assert_eq!(bar.held().map(|s| s.item), Some(ItemId::StonePickaxe));
    }

    #[test]
    fn test_serde_shape() {
        let mut bar = Hotbar::new();
        bar.add(ItemId::Cobblestone, 3).unwrap();
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["slots"][0]["item"], "cobblestone");
        assert_eq!(json["slots"][0]["count"], 3);
        assert!(json["slots"][1].is_null());
    }
}
