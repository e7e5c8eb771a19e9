//! # Crafting System - Recipe Graph
//!
//! **Transactional Recipe System with Cycle Detection**
//!
//! 1. **No Cycles**: The recipe graph is validated to be acyclic
//! 2. **Transactional**: All inputs consumed and all outputs granted, or
//!    nothing happens
//! 3. **External Configuration**: Recipes load from TOML; a built-in table
//!    is used when none is configured
//!
//! ## Security Model
//!
//! Crafting runs ONLY on the authoritative server. A request naming an
//! unknown recipe or lacking materials is rejected without side effects.
//!
//! ## TOML format
//!
//! ```toml
//! [[recipe]]
//! id = "planks"
//! inputs = [{ item = "log", count = 1 }]
//! outputs = [{ item = "planks", count = 4 }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use terra_shared::ItemId;

use crate::error::{EconomyError, EconomyResult};
use crate::inventory::Hotbar;

/// Input or output item in a recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeItem {
    /// The item.
    pub item: ItemId,
    /// Quantity required/produced.
    pub count: u32,
}

impl RecipeItem {
    /// Creates a new recipe item.
    #[inline]
    #[must_use]
    pub const fn new(item: ItemId, count: u32) -> Self {
        Self { item, count }
    }
}

/// A crafting recipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe identifier used in `action_craft`.
    pub id: String,
    /// Items consumed by this recipe.
    pub inputs: Vec<RecipeItem>,
    /// Items produced by this recipe.
    pub outputs: Vec<RecipeItem>,
}

impl Recipe {
    /// Creates a new recipe with basic validation.
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty, the recipe has no inputs or
    /// outputs, or any count is zero.
    pub fn new(id: impl Into<String>, inputs: Vec<RecipeItem>, outputs: Vec<RecipeItem>) -> EconomyResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(EconomyError::InvalidConfig("recipe id is empty".to_string()));
        }
        if inputs.is_empty() || outputs.is_empty() {
            return Err(EconomyError::InvalidConfig(format!(
                "recipe {id} must have at least one input and one output"
            )));
        }
        if inputs.iter().chain(&outputs).any(|i| i.count == 0) {
            return Err(EconomyError::InvalidConfig(format!("recipe {id} has a zero count")));
        }
        Ok(Self { id, inputs, outputs })
    }
}

#[derive(Deserialize)]
struct RecipeFile {
    #[serde(default)]
    recipe: Vec<Recipe>,
}

/// All known recipes, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct RecipeBook {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeBook {
    /// Creates an empty recipe book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in recipe table.
    #[must_use]
    pub fn builtin() -> Self {
        let table = [
            ("planks", vec![RecipeItem::new(ItemId::Log, 1)], RecipeItem::new(ItemId::Planks, 4)),
            ("stick", vec![RecipeItem::new(ItemId::Planks, 2)], RecipeItem::new(ItemId::Stick, 4)),
            (
                "wooden_pickaxe",
                vec![RecipeItem::new(ItemId::Planks, 3), RecipeItem::new(ItemId::Stick, 2)],
                RecipeItem::new(ItemId::WoodenPickaxe, 1),
            ),
            (
                "stone_pickaxe",
                vec![RecipeItem::new(ItemId::Cobblestone, 3), RecipeItem::new(ItemId::Stick, 2)],
                RecipeItem::new(ItemId::StonePickaxe, 1),
            ),
        ];
        let recipes = table
            .into_iter()
            .map(|(id, inputs, output)| {
                (id.to_string(), Recipe { id: id.to_string(), inputs, outputs: vec![output] })
            })
            .collect();
        Self { recipes }
    }

    /// Parses a TOML recipe table and validates it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on a parse error, an invalid recipe or a
    /// duplicate id, and `CycleDetected` if recipes feed each other.
    pub fn from_toml_str(source: &str) -> EconomyResult<Self> {
        let file: RecipeFile =
            toml::from_str(source).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        let mut book = Self::new();
        for recipe in file.recipe {
            book.add_recipe(Recipe::new(recipe.id, recipe.inputs, recipe.outputs)?)?;
        }
        book.validate_no_cycles()?;
        Ok(book)
    }

    /// Adds a recipe.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the id is already taken.
    pub fn add_recipe(&mut self, recipe: Recipe) -> EconomyResult<()> {
        if self.recipes.contains_key(&recipe.id) {
            return Err(EconomyError::InvalidConfig(format!("duplicate recipe {}", recipe.id)));
        }
        self.recipes.insert(recipe.id.clone(), recipe);
        Ok(())
    }

    /// Looks up a recipe.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// True when no recipes are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Checks the recipe graph is acyclic.
    ///
    /// Uses Kahn's algorithm: recipe A -> recipe B when A produces something
    /// B consumes. If every recipe can be sorted, there is no cycle.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` naming a recipe on a cycle.
    pub fn validate_no_cycles(&self) -> EconomyResult<()> {
        let mut producers: HashMap<ItemId, Vec<&str>> = HashMap::new();
        for recipe in self.recipes.values() {
            for output in &recipe.outputs {
                producers.entry(output.item).or_default().push(&recipe.id);
            }
        }

        let mut in_degree: HashMap<&str, usize> =
            self.recipes.keys().map(|id| (id.as_str(), 0)).collect();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for recipe in self.recipes.values() {
            for input in &recipe.inputs {
                for &producer in producers.get(&input.item).into_iter().flatten() {
                    adjacency.entry(producer).or_default().push(&recipe.id);
                    *in_degree.entry(&recipe.id).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> =
            in_degree.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();
        let mut sorted = 0;
        while let Some(id) = queue.pop_front() {
            sorted += 1;
            for &next in adjacency.get(id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if sorted == self.recipes.len() {
            return Ok(());
        }
        let stuck = in_degree
            .into_iter()
            .filter(|&(_, d)| d > 0)
            .map(|(id, _)| id.to_string())
            .min()
            .unwrap_or_default();
        Err(EconomyError::CycleDetected(stuck))
    }

    /// Checks whether the hotbar holds every input of a recipe.
    ///
    /// # Errors
    ///
    /// `RecipeNotFound` or `InsufficientMaterials`.
    pub fn can_craft(&self, hotbar: &Hotbar, id: &str) -> EconomyResult<&Recipe> {
        let recipe = self.get(id).ok_or_else(|| EconomyError::RecipeNotFound(id.to_string()))?;
        for input in &recipe.inputs {
            let available = hotbar.count_item(input.item);
            if available < input.count {
                return Err(EconomyError::InsufficientMaterials {
                    item: input.item,
                    required: input.count,
                    available,
                });
            }
        }
        Ok(recipe)
    }

    /// Performs a transactional craft.
    ///
    /// **ATOMIC**: Either all materials are consumed and all outputs
    /// granted, or the hotbar is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `RecipeNotFound` if the recipe doesn't exist
    /// - `InsufficientMaterials` if the inputs are missing
    /// - `InventoryFull` if the outputs do not fit
    pub fn craft(&self, hotbar: &mut Hotbar, id: &str) -> EconomyResult<Vec<RecipeItem>> {
        let recipe = self.can_craft(hotbar, id)?;
        let snapshot = hotbar.clone();

        let result = recipe
            .inputs
            .iter()
            .try_for_each(|input| hotbar.remove(input.item, input.count))
            .and_then(|()| {
                recipe
                    .outputs
                    .iter()
                    .try_for_each(|output| hotbar.add(output.item, output.count))
            });

        match result {
            Ok(()) => Ok(recipe.outputs.clone()),
            Err(e) => {
                *hotbar = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid_dag() {
        let book = RecipeBook::builtin();
        assert_eq!(book.len(), 4);
        assert!(book.validate_no_cycles().is_ok());
    }

    #[test]
    fn test_detect_cycle() {
        let mut book = RecipeBook::new();
        book.add_recipe(
            Recipe::new("a", vec![RecipeItem::new(ItemId::Log, 1)], vec![RecipeItem::new(ItemId::Planks, 1)])
                .unwrap(),
        )
        .unwrap();
        book.add_recipe(
            Recipe::new("b", vec![RecipeItem::new(ItemId::Planks, 1)], vec![RecipeItem::new(ItemId::Log, 1)])
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(book.validate_no_cycles(), Err(EconomyError::CycleDetected(_))));
    }

    #[test]
    fn test_transactional_craft_success() {
        let book = RecipeBook::builtin();
        let mut bar = Hotbar::new();
        bar.add(ItemId::Log, 2).unwrap();

        let out = book.craft(&mut bar, "planks").unwrap();
        assert_eq!(out, vec![RecipeItem::new(ItemId::Planks, 4)]);
        assert_eq!(bar.count_item(ItemId::Log), 1);
        assert_eq!(bar.count_item(ItemId::Planks), 4);
    }

    #[test]
    fn test_missing_materials_leaves_hotbar() {
        let book = RecipeBook::builtin();
        let mut bar = Hotbar::new();
        bar.add(ItemId::Planks, 3).unwrap();
        bar.add(ItemId::Stick, 1).unwrap();
        let before = bar.clone();

        assert!(matches!(
            book.craft(&mut bar, "wooden_pickaxe"),
            Err(EconomyError::InsufficientMaterials { item: ItemId::Stick, .. })
        ));
        assert_eq!(bar, before);
        assert!(matches!(book.craft(&mut bar, "diamond_sword"), Err(EconomyError::RecipeNotFound(_))));
    }

    #[test]
    fn test_full_hotbar_rolls_back() {
        let book = RecipeBook::builtin();
        let mut bar = Hotbar::new();
        // Fill every slot; the only log stack has a single log.
        bar.add(ItemId::Log, 1).unwrap();
        for item in [
            ItemId::Dirt,
            ItemId::Stone,
            ItemId::Sand,
            ItemId::Leaves,
            ItemId::Cobblestone,
            ItemId::Grass,
            ItemId::Stick,
        ] {
            bar.add(item, 64).unwrap();
        }
        bar.add(ItemId::WoodenPickaxe, 1).unwrap();
        let before = bar.clone();

        // Consuming the log frees its slot, so planks fit.
        assert!(book.craft(&mut bar, "planks").is_ok());

        // With 3 planks the stack survives the craft, so no slot frees up
        // and 4 sticks cannot join the full stick stack.
        bar = before;
        bar.remove(ItemId::Log, 1).unwrap();
        bar.add(ItemId::Planks, 3).unwrap();
        let before = bar.clone();
        let err = book.craft(&mut bar, "stick").unwrap_err();
        assert!(matches!(err, EconomyError::InventoryFull { item: ItemId::Stick, .. }));
        assert_eq!(bar, before);
    }

    #[test]
    fn test_craft_chain() {
        let book = RecipeBook::builtin();
        let mut bar = Hotbar::new();
        bar.add(ItemId::Log, 2).unwrap();
        book.craft(&mut bar, "planks").unwrap();
        book.craft(&mut bar, "planks").unwrap();
        book.craft(&mut bar, "stick").unwrap();
        book.craft(&mut bar, "wooden_pickaxe").unwrap();

        assert_eq!(bar.count_item(ItemId::WoodenPickaxe), 1);
        assert_eq!(bar.count_item(ItemId::Planks), 3);
        assert_eq!(bar.count_item(ItemId::Stick), 2);
    }

    #[test]
    fn test_from_toml() {
        let book = RecipeBook::from_toml_str(
            r#"
            [[recipe]]
            id = "planks"
            inputs = [{ item = "log", count = 1 }]
            outputs = [{ item = "planks", count = 2 }]
            "#,
        )
        .unwrap();
        assert_eq!(book.get("planks").unwrap().outputs[0].count, 2);

        assert!(RecipeBook::from_toml_str("[[recipe]]\nid = \"x\"\ninputs = []\noutputs = []").is_err());
        assert!(RecipeBook::from_toml_str(
            "[[recipe]]\nid = \"x\"\ninputs = [{ item = \"gold\", count = 1 }]\noutputs = [{ item = \"log\", count = 1 }]"
        )
        .is_err());
    }
}
