//! Crafting Calculator
//!
//! Resolves the full tree of sub-crafts and raw materials needed to craft an item.

mod calculator;
mod db;
mod error;
mod import;
mod index;
mod models;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::calculator::CraftingResolver;
use crate::models::{Catalog, RecipeOverrides};

#[derive(Parser)]
#[command(name = "craft-calculator")]
#[command(about = "Crafting dependency calculator for game item and recipe databases")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "craft_data.db", global = true)]
    database: PathBuf,

    /// Read the catalog from a JSON recipe book instead of the database
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import recipe books (*.json) and recipe sheets (*.tsv) from a file or directory
    Import {
        /// File or directory to import
        path: PathBuf,

        /// Clear existing catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Calculate everything needed to craft an item
    Calc {
        /// Target item id (e.g., "iron-sword")
        item: String,

        /// Number of items to craft
        #[arg(short, long, default_value = "1")]
        quantity: u64,

        /// Use a specific recipe for an item, as ITEM=RECIPE (repeatable)
        #[arg(short = 'u', long = "use", value_name = "ITEM=RECIPE")]
        overrides: Vec<String>,

        /// Show the full crafting tree
        #[arg(short, long)]
        tree: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search items by name
    Search {
        query: String,
    },

    /// Show an item with its recipes and the items that use it
    Item {
        /// Item id
        id: String,
    },

    /// Show a single recipe
    Recipe {
        /// Recipe id
        id: String,
    },

    /// List main item categories
    Categories,

    /// List items, optionally restricted to a category
    ListItems {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "craft_calculator=info",
        1 => "craft_calculator=debug",
        _ => "craft_calculator=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Import { path, clear } => {
            let conn = open_database(&cli.database)?;
            if clear {
                info!("Clearing existing catalog...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_path(&conn, &path)?;
            println!("{}", stats);
        }

        Commands::Calc {
            item,
            quantity,
            overrides,
            tree,
            json,
        } => {
            if quantity == 0 {
                bail!("Quantity must be at least 1");
            }
            let overrides = parse_overrides(&overrides)?;
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;

            let result = resolver.resolve(&item, quantity, &overrides)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                if tree {
                    println!("Crafting tree:\n");
                    println!("{}", calculator::format_crafting_tree(&result.tree, 0));
                }

                let summary = calculator::summarize(&result, quantity);
                println!("{}", summary);
            }
        }

        Commands::Search { query } => {
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;
            let items = resolver.search_items(&query);
            if items.is_empty() {
                println!("No items matching '{}'", query);
            } else {
                for item in items {
                    println!("  {:<32} {}", item.id, item.name);
                }
            }
        }

        Commands::Item { id } => {
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;
            let Some(item) = resolver.get_item(&id) else {
                println!("Item '{}' not found", id);
                return Ok(());
            };

            println!("Item: {}", item.name);
            println!("  ID: {}", item.id);
            if let Some(category) = &item.category {
                println!("  Category: {}", category);
            }
            println!("  Craftable: {}", if item.craftable { "yes" } else { "no" });
            if let Some(description) = &item.description {
                println!("  {}", description);
            }

            let recipes = resolver.get_recipes(&id);
            if !recipes.is_empty() {
                println!("  Recipes:");
                for recipe in recipes {
                    println!(
                        "    {} ({}x{})",
                        recipe.id,
                        recipe.output_quantity,
                        recipe
                            .station
                            .as_deref()
                            .map(|s| format!(" at {}", s))
                            .unwrap_or_default()
                    );
                    for ingredient in &recipe.ingredients {
                        println!("      {}x {}", ingredient.quantity, ingredient.item_id);
                    }
                }
            }

            let used_by = resolver.get_used_by(&id);
            if !used_by.is_empty() {
                println!("  Used by:");
                for (item, recipe) in used_by {
                    println!("    {} ({})", item.name, recipe.id);
                }
            }
        }

        Commands::Recipe { id } => {
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;
            match resolver.get_recipe_by_id(&id) {
                Some(recipe) => {
                    println!("Recipe: {}", recipe.id);
                    println!("  Output: {}x {}", recipe.output_quantity, recipe.output_item_id);
                    if let Some(station) = &recipe.station {
                        println!("  Station: {}", station);
                    }
                    if let Some(requirements) = &recipe.requirements {
                        println!("  Requires: {}", requirements);
                    }
                    println!("  Ingredients:");
                    for ingredient in &recipe.ingredients {
                        println!("    {}x {}", ingredient.quantity, ingredient.item_id);
                    }
                }
                None => println!("Recipe '{}' not found", id),
            }
        }

        Commands::Categories => {
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;
            let categories = resolver.get_categories();
            if categories.is_empty() {
                println!("No categories in catalog. Run 'import' or 'load-sample' first.");
            } else {
                for category in categories {
                    println!("  {}", category);
                }
            }
        }

        Commands::ListItems { category } => {
            let resolver = open_resolver(&cli.database, cli.catalog.as_deref())?;
            let items = match &category {
                Some(category) => resolver.get_items_by_category(category),
                None => resolver.get_all_items().iter().collect(),
            };

            if items.is_empty() {
                println!("No items in catalog. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<32} {:<32} {:>9}", "Item", "Category", "Craftable");
                println!("{}", "-".repeat(75));
                for item in items {
                    println!(
                        "{:<32} {:<32} {:>9}",
                        item.name,
                        item.category.as_deref().unwrap_or("-"),
                        if item.craftable { "yes" } else { "no" }
                    );
                }
            }
        }

        Commands::Init => {
            let conn = open_database(&cli.database)?;
            let (items, recipes) = db::catalog_counts(&conn)?;
            println!("Database initialized at: {}", cli.database.display());
            println!("  {} items, {} recipes", items, recipes);
            if let Some(source) = db::get_meta_value(&conn, "source")? {
                println!("  Source: {}", source);
            }
        }

        Commands::LoadSample => {
            let conn = open_database(&cli.database)?;
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// Build a resolver from the `--catalog` recipe book, or from the database
///
/// The database is only opened when no recipe book is given.
fn open_resolver(database: &Path, catalog: Option<&Path>) -> Result<CraftingResolver> {
    let catalog: Catalog = match catalog {
        Some(path) => import::parse_recipe_book(path)?.into_catalog(),
        None => db::load_catalog(&open_database(database)?)?,
    };
    debug!(
        "Loaded catalog: {} items, {} recipes",
        catalog.items.len(),
        catalog.recipes.len()
    );
    Ok(CraftingResolver::new(catalog))
}

/// Parse `ITEM=RECIPE` pairs
fn parse_overrides(pairs: &[String]) -> Result<RecipeOverrides> {
    let mut overrides = RecipeOverrides::new();
    for pair in pairs {
        let (item, recipe) = pair
            .split_once('=')
            .filter(|(item, recipe)| !item.trim().is_empty() && !recipe.trim().is_empty())
            .ok_or_else(|| anyhow!("Invalid override '{}', expected ITEM=RECIPE", pair))?;
        overrides.insert(item.trim().to_string(), recipe.trim().to_string());
    }
    Ok(overrides)
}

/// Load a small sample catalog for testing without imported data
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{Ingredient, Item, Recipe, RecipeBook};

    db::clear_catalog(conn)?;

    let item = |name: &str, category: &str, craftable: bool| {
        let id = models::normalize_id(name);
        Item {
            id: id.clone(),
            name: name.to_string(),
            normalized_name: id,
            category: Some(category.to_string()),
            craftable,
            icon_url: None,
            description: None,
        }
    };
    let recipe = |id: &str,
                  output: &str,
                  output_quantity: u64,
                  station: &str,
                  ingredients: &[(&str, u64)]| Recipe {
        id: id.to_string(),
        output_item_id: output.to_string(),
        output_quantity,
        station: Some(station.to_string()),
        ingredients: ingredients
            .iter()
            .map(|(item_id, quantity)| Ingredient {
                item_id: item_id.to_string(),
                quantity: *quantity,
            })
            .collect(),
        requirements: None,
    };

    let book = RecipeBook {
        items: vec![
            item("Sword", "Weapons - One-Handed Weapons", true),
            item("Iron Pickaxe", "Survival - Pickaxes", true),
            item("Iron Bar", "Resources", true),
            item("Charcoal", "Resources", true),
            item("Nails", "Resources", true),
            item("Iron Ore", "Materials", false),
            item("Wood", "Materials", false),
            item("Metal Scraps", "Materials", false),
            item("Hardwood", "Materials", false),
        ],
        recipes: vec![
            recipe("recipe-sword", "sword", 1, "forge", &[("iron-bar", 3), ("wood", 2)]),
            recipe(
                "recipe-iron-pickaxe",
                "iron-pickaxe",
                1,
                "blacksmith",
                &[("iron-bar", 8), ("hardwood", 1), ("nails", 3)],
            ),
            recipe(
                "recipe-iron-bar",
                "iron-bar",
                2,
                "smelter",
                &[("iron-ore", 3), ("charcoal", 1)],
            ),
            // Slower alternative, selectable with --use iron-bar=recipe-iron-bar-furnace
            recipe(
                "recipe-iron-bar-furnace",
                "iron-bar",
                1,
                "furnace",
                &[("iron-ore", 2), ("wood", 2)],
            ),
            recipe("recipe-charcoal", "charcoal", 5, "charcoal-kiln", &[("wood", 3)]),
            recipe("recipe-nails", "nails", 2, "blacksmith", &[("metal-scraps", 1)]),
        ],
        meta: None,
    };

    book.validate()?;
    let mut stats = import::ImportStats::default();
    import::store_recipe_book(conn, &book, &mut stats)?;

    println!("Loaded {} sample items and {} recipes", stats.items, stats.recipes);
    Ok(())
}
