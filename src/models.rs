//! Data models for catalog items, recipes and crafting results

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// False forces raw-material treatment even when recipes exist
    #[serde(default)]
    pub craftable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub item_id: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub output_item_id: String,
    #[serde(default = "default_output_quantity")]
    pub output_quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>, // e.g. forge, smelter, blacksmith
    pub ingredients: Vec<Ingredient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>, // e.g. "Blacksmith level 5"
}

fn default_output_quantity() -> u64 {
    1
}

/// The static set of items and recipes driving resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub items: Vec<Item>,
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    pub scraped_at: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub source: String,
    pub total_items: u64,
    pub total_recipes: u64,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Persisted catalog document (`recipes.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeBook {
    pub items: Vec<Item>,
    pub recipes: Vec<Recipe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CatalogMeta>,
}

impl RecipeBook {
    /// Check the structural rules every catalog must satisfy before it reaches the resolver
    pub fn validate(&self) -> Result<(), CatalogError> {
        for item in &self.items {
            if item.id.is_empty() {
                return Err(CatalogError::EmptyField {
                    field: "item id",
                    context: item.name.clone(),
                });
            }
            if item.name.is_empty() {
                return Err(CatalogError::EmptyField {
                    field: "item name",
                    context: item.id.clone(),
                });
            }
        }

        for recipe in &self.recipes {
            if recipe.id.is_empty() {
                return Err(CatalogError::EmptyField {
                    field: "recipe id",
                    context: recipe.output_item_id.clone(),
                });
            }
            if recipe.output_item_id.is_empty() {
                return Err(CatalogError::EmptyField {
                    field: "output item id",
                    context: recipe.id.clone(),
                });
            }
            if recipe.output_quantity == 0 {
                return Err(CatalogError::ZeroQuantity {
                    recipe_id: recipe.id.clone(),
                    what: "output".to_string(),
                });
            }
            if recipe.ingredients.is_empty() {
                return Err(CatalogError::NoIngredients(recipe.id.clone()));
            }
            for ingredient in &recipe.ingredients {
                if ingredient.item_id.is_empty() {
                    return Err(CatalogError::EmptyField {
                        field: "ingredient item id",
                        context: recipe.id.clone(),
                    });
                }
                if ingredient.quantity == 0 {
                    return Err(CatalogError::ZeroQuantity {
                        recipe_id: recipe.id.clone(),
                        what: ingredient.item_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn into_catalog(self) -> Catalog {
        Catalog {
            items: self.items,
            recipes: self.recipes,
        }
    }
}

/// Per-query substitution of the recipe used for an item (item id -> recipe id)
pub type RecipeOverrides = HashMap<String, String>;

/// A node in the crafting tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftingNode {
    pub item_id: String,
    pub item_name: String,
    pub required_quantity: u64,
    pub per_craft: u64,
    pub crafts_needed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub is_base_material: bool,
    pub children: Vec<CraftingNode>,
}

impl CraftingNode {
    pub fn base_material(item_id: &str, item_name: &str, required_quantity: u64) -> Self {
        Self {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            required_quantity,
            per_craft: 1,
            crafts_needed: required_quantity,
            recipe_id: None,
            station: None,
            is_base_material: true,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialTotal {
    pub quantity: u64,
    pub item_name: String,
    pub is_base_material: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
}

/// Aggregated quantities keyed by item id
pub type MaterialTotals = BTreeMap<String, MaterialTotal>;

/// Recoverable anomalies met while building a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    #[serde(rename_all = "camelCase")]
    Cycle { item_id: String },
    #[serde(rename_all = "camelCase")]
    DepthLimit { item_id: String },
    #[serde(rename_all = "camelCase")]
    OverrideNotFound { item_id: String, recipe_id: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { item_id } => {
                write!(f, "cycle detected at '{}', treated as base material", item_id)
            }
            Self::DepthLimit { item_id } => {
                write!(f, "depth limit reached at '{}', treated as base material", item_id)
            }
            Self::OverrideNotFound { item_id, recipe_id } => write!(
                f,
                "override recipe '{}' not found for '{}', using default",
                recipe_id, item_id
            ),
        }
    }
}

/// Result of a crafting resolution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftingResult {
    pub tree: CraftingNode,
    pub totals: MaterialTotals,
    pub base_materials_only: MaterialTotals,
    pub by_station: BTreeMap<String, MaterialTotals>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Derive a stable kebab-case id from a display name
///
/// "Jezmina's Apotheosis" becomes `jezminas-apotheosis`, "Mace (Heavy)" becomes `mace-heavy`.
pub fn normalize_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.trim().to_lowercase().chars() {
        match ch {
            '\'' | '\u{2019}' => {}
            '-' => pending_hyphen = true,
            c if c.is_whitespace() => pending_hyphen = true,
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => {
                if pending_hyphen && !id.is_empty() {
                    id.push('-');
                }
                pending_hyphen = false;
                id.push(c);
            }
            _ => {} // parentheses, punctuation, non-ascii
        }
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("Iron Bar"), "iron-bar");
        assert_eq!(normalize_id("Jezmina's Apotheosis"), "jezminas-apotheosis");
        assert_eq!(normalize_id("Fenrig\u{2019}s Axe"), "fenrigs-axe");
        assert_eq!(normalize_id("  Mace (Heavy)  "), "mace-heavy");
        assert_eq!(normalize_id("Mace-like   Club"), "mace-like-club");
        assert_eq!(normalize_id("Grappling Hook - Pull"), "grappling-hook-pull");
    }

    #[test]
    fn test_recipe_book_defaults() {
        let json = r#"{
            "items": [{"id": "nails", "name": "Nails", "normalizedName": "nails"}],
            "recipes": [{
                "id": "recipe-nails",
                "outputItemId": "nails",
                "ingredients": [{"itemId": "metal-scraps", "quantity": 1}]
            }]
        }"#;
        let book: RecipeBook = serde_json::from_str(json).unwrap();

        assert!(!book.items[0].craftable);
        assert_eq!(book.items[0].category, None);
        assert_eq!(book.recipes[0].output_quantity, 1);
        assert_eq!(book.recipes[0].station, None);
        assert!(book.meta.is_none());
    }

    #[test]
    fn test_meta_version_default() {
        let json = r#"{
            "items": [],
            "recipes": [],
            "meta": {
                "scrapedAt": "2026-01-01T00:00:00.000Z",
                "source": "https://example.com/recipes",
                "totalItems": 0,
                "totalRecipes": 0
            }
        }"#;
        let book: RecipeBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.meta.unwrap().version, "1.0.0");
    }

    #[test]
    fn test_validate_rejects_bad_recipes() {
        let mut book = RecipeBook {
            items: vec![],
            recipes: vec![Recipe {
                id: "recipe-nails".to_string(),
                output_item_id: "nails".to_string(),
                output_quantity: 2,
                station: None,
                ingredients: vec![],
                requirements: None,
            }],
            meta: None,
        };
        assert!(matches!(book.validate(), Err(CatalogError::NoIngredients(_))));

        book.recipes[0].ingredients.push(Ingredient {
            item_id: "metal-scraps".to_string(),
            quantity: 0,
        });
        assert!(matches!(
            book.validate(),
            Err(CatalogError::ZeroQuantity { .. })
        ));

        book.recipes[0].ingredients[0].quantity = 1;
        assert!(book.validate().is_ok());

        book.recipes[0].output_quantity = 0;
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_diagnostic_serializes_with_kind_tag() {
        let diagnostic = Diagnostic::OverrideNotFound {
            item_id: "iron-bar".to_string(),
            recipe_id: "recipe-missing".to_string(),
        };
        let value = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(value["kind"], "overrideNotFound");
        assert_eq!(value["itemId"], "iron-bar");
        assert_eq!(value["recipeId"], "recipe-missing");
    }
}
