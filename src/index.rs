//! Lookup structures over an immutable catalog

use std::collections::HashMap;

use tracing::warn;

use crate::models::{Catalog, Item, Recipe};

/// Item, recipe-by-output and recipe-by-id lookups built once per catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    items: Vec<Item>,
    item_positions: HashMap<String, usize>,
    recipes: Vec<Recipe>,
    recipes_by_output: HashMap<String, Vec<usize>>,
    recipe_by_id: HashMap<String, usize>,
}

impl CatalogIndex {
    pub fn new(catalog: Catalog) -> Self {
        let mut items: Vec<Item> = Vec::with_capacity(catalog.items.len());
        let mut item_positions: HashMap<String, usize> = HashMap::with_capacity(catalog.items.len());

        for item in catalog.items {
            match item_positions.get(&item.id).copied() {
                Some(pos) => {
                    warn!("Duplicate item id '{}', keeping the later definition", item.id);
                    items[pos] = item;
                }
                None => {
                    item_positions.insert(item.id.clone(), items.len());
                    items.push(item);
                }
            }
        }

        let mut recipes_by_output: HashMap<String, Vec<usize>> = HashMap::new();
        let mut recipe_by_id: HashMap<String, usize> = HashMap::with_capacity(catalog.recipes.len());

        // Group order follows catalog order, which decides the default recipe
        for (pos, recipe) in catalog.recipes.iter().enumerate() {
            recipes_by_output
                .entry(recipe.output_item_id.clone())
                .or_default()
                .push(pos);

            if recipe_by_id.contains_key(&recipe.id) {
                warn!("Duplicate recipe id '{}', overrides resolve to the first", recipe.id);
            } else {
                recipe_by_id.insert(recipe.id.clone(), pos);
            }
        }

        Self {
            items,
            item_positions,
            recipes: catalog.recipes,
            recipes_by_output,
            recipe_by_id,
        }
    }

    pub fn get_item(&self, id: &str) -> Option<&Item> {
        self.item_positions.get(id).map(|&pos| &self.items[pos])
    }

    /// Recipes producing `item_id`, in catalog order (empty when none)
    pub fn get_recipes(&self, item_id: &str) -> Vec<&Recipe> {
        self.recipes_by_output
            .get(item_id)
            .map(|positions| positions.iter().map(|&pos| &self.recipes[pos]).collect())
            .unwrap_or_default()
    }

    /// First-registered recipe for `item_id`
    pub fn default_recipe(&self, item_id: &str) -> Option<&Recipe> {
        self.recipes_by_output
            .get(item_id)
            .and_then(|positions| positions.first())
            .map(|&pos| &self.recipes[pos])
    }

    pub fn get_recipe_by_id(&self, id: &str) -> Option<&Recipe> {
        self.recipe_by_id.get(id).map(|&pos| &self.recipes[pos])
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            normalized_name: id.to_string(),
            category: None,
            craftable: true,
            icon_url: None,
            description: None,
        }
    }

    fn recipe(id: &str, output: &str, station: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            output_item_id: output.to_string(),
            output_quantity: 1,
            station: Some(station.to_string()),
            ingredients: vec![Ingredient {
                item_id: "iron-ore".to_string(),
                quantity: 1,
            }],
            requirements: None,
        }
    }

    #[test]
    fn test_recipes_grouped_in_catalog_order() {
        let index = CatalogIndex::new(Catalog {
            items: vec![item("iron-bar", "Iron Bar")],
            recipes: vec![
                recipe("recipe-iron-bar-furnace", "iron-bar", "furnace"),
                recipe("recipe-nails", "nails", "forge"),
                recipe("recipe-iron-bar-smelter", "iron-bar", "smelter"),
            ],
        });

        let ids: Vec<_> = index.get_recipes("iron-bar").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["recipe-iron-bar-furnace", "recipe-iron-bar-smelter"]);
        assert_eq!(
            index.default_recipe("iron-bar").map(|r| r.id.as_str()),
            Some("recipe-iron-bar-furnace")
        );
        assert!(index.get_recipes("wood").is_empty());
        assert!(index.default_recipe("wood").is_none());
    }

    #[test]
    fn test_recipe_by_id() {
        let index = CatalogIndex::new(Catalog {
            items: vec![],
            recipes: vec![
                recipe("recipe-a", "a", "forge"),
                recipe("recipe-a", "b", "smelter"),
            ],
        });

        assert_eq!(index.get_recipe_by_id("recipe-a").unwrap().output_item_id, "a");
        assert!(index.get_recipe_by_id("recipe-missing").is_none());
    }

    #[test]
    fn test_duplicate_item_replaced_in_place() {
        let index = CatalogIndex::new(Catalog {
            items: vec![
                item("wood", "Wood"),
                item("stone", "Stone"),
                item("wood", "Wood Logs"),
            ],
            recipes: vec![],
        });

        assert_eq!(index.items().len(), 2);
        assert_eq!(index.items()[0].name, "Wood Logs");
        assert_eq!(index.get_item("wood").unwrap().name, "Wood Logs");
        assert!(index.get_item("iron").is_none());
    }
}
