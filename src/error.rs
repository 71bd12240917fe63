//! Error types for catalog loading and crafting resolution

use thiserror::Error;

/// Fatal resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The target or a referenced ingredient is missing from the catalog
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// A scaled or summed quantity no longer fits in a `u64`
    #[error("Quantity overflow for item: {0}")]
    QuantityOverflow(String),
}

/// Structural problems in a recipe book
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Empty {field} ({context})")]
    EmptyField { field: &'static str, context: String },

    #[error("Recipe {recipe_id} has a zero quantity for {what}")]
    ZeroQuantity { recipe_id: String, what: String },

    #[error("Recipe {0} has no ingredients")]
    NoIngredients(String),
}
