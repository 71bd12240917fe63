//! Catalog import from recipe books and recipe sheets on disk
//!
//! Two formats are understood:
//! - `*.json` recipe books (`{items, recipes, meta}`), imported as authoritative data
//! - `*.tsv` recipe sheets, one recipe per line, merged into what is already stored

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{Ingredient, Item, Recipe, RecipeBook, normalize_id};

/// Find all recipe books and sheets under `path` (or `path` itself when it is a file)
pub fn find_catalog_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && SourceKind::of(path).is_some() {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Book,
    Sheet,
}

impl SourceKind {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Self::Book),
            Some("tsv") => Some(Self::Sheet),
            _ => None,
        }
    }
}

/// Parse and validate a JSON recipe book
pub fn parse_recipe_book(filepath: &Path) -> Result<RecipeBook> {
    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read {}", filepath.display()))?;

    let book: RecipeBook = serde_json::from_str(&content)
        .with_context(|| format!("Invalid recipe book {}", filepath.display()))?;
    book.validate()
        .with_context(|| format!("Invalid recipe book {}", filepath.display()))?;

    Ok(book)
}

/// Parse a tab-separated recipe sheet
///
/// Each line reads `Name<TAB>Amount<TAB>Ingredient xN, Ingredient xN<TAB>Category`.
/// The station is taken from the file name (`blacksmith.tsv` -> `blacksmith`).
pub fn parse_recipe_sheet(filepath: &Path) -> Result<RecipeBook> {
    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read {}", filepath.display()))?;

    let station = filepath
        .file_stem()
        .and_then(|s| s.to_str())
        .map(normalize_id)
        .filter(|s| !s.is_empty());

    parse_sheet_content(&content, station.as_deref())
}

fn parse_sheet_content(content: &str, station: Option<&str>) -> Result<RecipeBook> {
    // Pattern: "Copper Bars x6"
    let ingredient_re = Regex::new(r"^(.+?)\s+x(\d+)$")?;

    let mut items: Vec<Item> = Vec::new();
    let mut recipes = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (row, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 3 {
            warn!("Skipping line {}: expected at least 3 columns", row + 1);
            continue;
        }

        let name = columns[0].trim();
        let item_id = normalize_id(name);
        if item_id.is_empty() {
            warn!("Skipping line {}: empty item name", row + 1);
            continue;
        }

        let output_quantity = columns[1]
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|&q| q > 0)
            .unwrap_or(1);
        let category = columns
            .get(3)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or("Miscellaneous");

        let mut ingredients = Vec::new();
        for part in columns[2].split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match ingredient_re.captures(part) {
                Some(cap) => match cap[2].parse::<u64>() {
                    Ok(quantity) if quantity > 0 => ingredients.push(Ingredient {
                        item_id: normalize_id(&cap[1]),
                        quantity,
                    }),
                    _ => warn!("Could not parse ingredient quantity: {}", part),
                },
                None => warn!("Could not parse ingredient: {}", part),
            }
        }

        let craftable = !ingredients.is_empty();
        match items.iter_mut().find(|i| i.id == item_id) {
            // Defined earlier as an inferred ingredient; the sheet row is the better source
            Some(existing) => {
                existing.name = name.to_string();
                existing.category = Some(category.to_string());
                existing.craftable |= craftable;
            }
            None => {
                seen.insert(item_id.clone());
                items.push(Item {
                    id: item_id.clone(),
                    name: name.to_string(),
                    normalized_name: item_id.clone(),
                    category: Some(category.to_string()),
                    craftable,
                    icon_url: None,
                    description: None,
                });
            }
        }

        for ingredient in &ingredients {
            if seen.insert(ingredient.item_id.clone()) {
                items.push(inferred_item(&ingredient.item_id));
            }
        }

        if craftable {
            let id = match station {
                Some(station) => format!("recipe-{}-{}-{}", item_id, station, row),
                None => format!("recipe-{}-{}", item_id, row),
            };
            recipes.push(Recipe {
                id,
                output_item_id: item_id,
                output_quantity,
                station: station.map(str::to_string),
                ingredients,
                requirements: None,
            });
        }
    }

    Ok(RecipeBook {
        items,
        recipes,
        meta: None,
    })
}

/// An ingredient item that only appears by name in another recipe
fn inferred_item(item_id: &str) -> Item {
    let name = item_id
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    Item {
        id: item_id.to_string(),
        name,
        normalized_name: item_id.to_string(),
        category: Some("Materials".to_string()),
        craftable: false,
        icon_url: None,
        description: None,
    }
}

/// Store a recipe book as-is, replacing stored items and recipes with the same ids
pub fn store_recipe_book(conn: &Connection, book: &RecipeBook, stats: &mut ImportStats) -> Result<()> {
    for item in &book.items {
        db::upsert_item(conn, item)?;
    }
    for recipe in &book.recipes {
        db::upsert_recipe(conn, recipe)?;
    }
    if let Some(meta) = &book.meta {
        db::set_meta(conn, meta)?;
        info!("Recipe book from {} (scraped {})", meta.source, meta.scraped_at);
    }

    stats.items += book.items.len();
    stats.recipes += book.recipes.len();
    Ok(())
}

/// Merge sheet data: keep stored items, skip recipes already known for the same station
fn merge_recipe_sheet(conn: &Connection, book: &RecipeBook, stats: &mut ImportStats) -> Result<()> {
    for item in &book.items {
        if db::insert_item_if_absent(conn, item)? {
            stats.items += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    // Only recipes stored before this sheet count as known; rows of the sheet may be alternatives
    let mut known: HashSet<(&str, Option<&str>)> = HashSet::new();
    for recipe in &book.recipes {
        let key = (recipe.output_item_id.as_str(), recipe.station.as_deref());
        if db::recipe_exists_for(conn, key.0, key.1)? {
            known.insert(key);
        }
    }

    for recipe in &book.recipes {
        db::mark_craftable(conn, &recipe.output_item_id)?;

        if known.contains(&(recipe.output_item_id.as_str(), recipe.station.as_deref())) {
            debug!("Recipe for {} already exists, skipping", recipe.output_item_id);
            stats.duplicates += 1;
            continue;
        }
        db::upsert_recipe(conn, recipe)?;
        stats.recipes += 1;
    }

    Ok(())
}

/// Import every recipe book and sheet under `path` into the database
pub fn import_path(conn: &Connection, path: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!("Scanning {} for recipe files...", path.display());
    let files = find_catalog_files(path)?;
    info!("Found {} recipe files", files.len());

    for filepath in &files {
        let parsed = match SourceKind::of(filepath) {
            Some(SourceKind::Book) => parse_recipe_book(filepath).map(|b| (SourceKind::Book, b)),
            Some(SourceKind::Sheet) => parse_recipe_sheet(filepath).map(|b| (SourceKind::Sheet, b)),
            None => continue,
        };

        match parsed {
            Ok((kind, book)) => {
                let tx = conn.unchecked_transaction()?;
                match kind {
                    SourceKind::Book => store_recipe_book(&tx, &book, &mut stats)?,
                    SourceKind::Sheet => merge_recipe_sheet(&tx, &book, &mut stats)?,
                }
                tx.commit()?;

                stats.files += 1;
                info!(
                    "  Imported: {} ({} items, {} recipes)",
                    filepath.display(),
                    book.items.len(),
                    book.recipes.len()
                );
            }
            Err(e) => {
                warn!("  Error parsing {}: {:#}", filepath.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub items: usize,
    pub recipes: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} files ({} items, {} recipes). Duplicates skipped: {}, Errors: {}",
            self.files, self.items, self.recipes, self.duplicates, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACKSMITH_SHEET: &str = "\
Nails\t2\tMetal Scraps x1\tResources
Legendary Runes\t1\t\tResources
Spiked Club\t1\tNails x4, Wood Logs x4\tWeapons - One-Handed Weapons
Lupa's Scalper\t1\tGold Bars x5, Hardened Leather, Tropical Wood x2\tWeapons - One-Handed Weapons
";

    const BOOK: &str = r#"{
        "items": [
            {"id": "iron-bar", "name": "Iron Bar", "normalizedName": "iron-bar", "craftable": true},
            {"id": "iron-ore", "name": "Iron Ore", "normalizedName": "iron-ore"}
        ],
        "recipes": [{
            "id": "recipe-iron-bar",
            "outputItemId": "iron-bar",
            "outputQuantity": 2,
            "station": "smelter",
            "ingredients": [{"itemId": "iron-ore", "quantity": 3}]
        }],
        "meta": {
            "scrapedAt": "2026-01-01T00:00:00.000Z",
            "version": "1.0.0",
            "source": "https://example.com/recipes",
            "totalItems": 2,
            "totalRecipes": 1
        }
    }"#;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_parse_sheet_rows() {
        let book = parse_sheet_content(BLACKSMITH_SHEET, Some("blacksmith")).unwrap();

        assert_eq!(book.recipes.len(), 3);
        let nails = &book.recipes[0];
        assert_eq!(nails.id, "recipe-nails-blacksmith-0");
        assert_eq!(nails.output_quantity, 2);
        assert_eq!(nails.station.as_deref(), Some("blacksmith"));
        assert_eq!(nails.ingredients[0].item_id, "metal-scraps");

        let club = &book.recipes[1];
        assert_eq!(club.output_item_id, "spiked-club");
        assert_eq!(club.ingredients.len(), 2);
        assert_eq!(club.ingredients[1].item_id, "wood-logs");
        assert_eq!(club.ingredients[1].quantity, 4);

        // The ingredient without a quantity is dropped
        let scalper = &book.recipes[2];
        assert_eq!(scalper.output_item_id, "lupas-scalper");
        assert_eq!(scalper.ingredients.len(), 2);
    }

    #[test]
    fn test_parse_sheet_items() {
        let book = parse_sheet_content(BLACKSMITH_SHEET, Some("blacksmith")).unwrap();

        let runes = book.items.iter().find(|i| i.id == "legendary-runes").unwrap();
        assert!(!runes.craftable);
        assert_eq!(runes.category.as_deref(), Some("Resources"));

        // "Nails" is listed as a row before it is used as an ingredient
        let nails: Vec<_> = book.items.iter().filter(|i| i.id == "nails").collect();
        assert_eq!(nails.len(), 1);
        assert!(nails[0].craftable);

        let scraps = book.items.iter().find(|i| i.id == "metal-scraps").unwrap();
        assert_eq!(scraps.name, "Metal Scraps");
        assert_eq!(scraps.category.as_deref(), Some("Materials"));
        assert!(!scraps.craftable);

        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_sheet_row_upgrades_inferred_item() {
        let sheet = "Iron Axe\t1\tIron Bars x4\tSurvival\nIron Bars\t1\tIron Ore x2\tResources\n";
        let book = parse_sheet_content(sheet, None).unwrap();

        let bars = book.items.iter().find(|i| i.id == "iron-bars").unwrap();
        assert!(bars.craftable);
        assert_eq!(bars.category.as_deref(), Some("Resources"));
        assert_eq!(book.recipes[1].id, "recipe-iron-bars-1");
        assert_eq!(book.recipes[1].station, None);
    }

    #[test]
    fn test_import_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.json"), BOOK).unwrap();
        fs::create_dir(dir.path().join("sheets")).unwrap();
        fs::write(dir.path().join("sheets").join("blacksmith.tsv"), BLACKSMITH_SHEET).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a catalog").unwrap();

        let files = find_catalog_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let conn = memory_db();
        let stats = import_path(&conn, dir.path()).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.recipes, 4);

        let catalog = db::load_catalog(&conn).unwrap();
        assert_eq!(catalog.recipes[0].id, "recipe-iron-bar");
        assert!(catalog.items.iter().any(|i| i.id == "spiked-club"));
        assert_eq!(
            db::get_meta_value(&conn, "source").unwrap().as_deref(),
            Some("https://example.com/recipes")
        );
    }

    #[test]
    fn test_sheet_merge_skips_known_recipes() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("smelter.tsv");
        fs::write(
            &sheet,
            "Iron Bar\t1\tIron Ore x2\tResources\nCopper Bar\t1\tCopper Ore x2\tResources\n",
        )
        .unwrap();

        let conn = memory_db();
        let book: RecipeBook = serde_json::from_str(BOOK).unwrap();
        let mut stats = ImportStats::default();
        store_recipe_book(&conn, &book, &mut stats).unwrap();
        db::upsert_item(
            &conn,
            &Item {
                id: "copper-bar".to_string(),
                name: "Copper Bar".to_string(),
                normalized_name: "copper-bar".to_string(),
                category: Some("Metals".to_string()),
                craftable: false,
                icon_url: None,
                description: None,
            },
        )
        .unwrap();

        let stats = import_path(&conn, &sheet).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.recipes, 1);

        let catalog = db::load_catalog(&conn).unwrap();
        let iron_recipes = catalog.recipes.iter().filter(|r| r.output_item_id == "iron-bar");
        assert_eq!(iron_recipes.count(), 1);

        // Existing item kept its data but became craftable
        let copper = catalog.items.iter().find(|i| i.id == "copper-bar").unwrap();
        assert_eq!(copper.category.as_deref(), Some("Metals"));
        assert!(copper.craftable);
    }

    #[test]
    fn test_sheet_keeps_alternative_recipes() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("blacksmith.tsv");
        fs::write(
            &sheet,
            "Iron Bar\t1\tIron Ore x2\tResources\nIron Bar\t2\tMetal Scraps x5\tResources\n",
        )
        .unwrap();

        let conn = memory_db();
        let stats = import_path(&conn, &sheet).unwrap();
        assert_eq!(stats.recipes, 2);
        assert_eq!(stats.duplicates, 0);

        let catalog = db::load_catalog(&conn).unwrap();
        let ids: Vec<_> = catalog.recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["recipe-iron-bar-blacksmith-0", "recipe-iron-bar-blacksmith-1"]
        );

        // A second import of the same sheet finds both already stored
        let stats = import_path(&conn, &sheet).unwrap();
        assert_eq!(stats.recipes, 0);
        assert_eq!(stats.duplicates, 5);
        assert_eq!(db::catalog_counts(&conn).unwrap(), (3, 2));
    }

    #[test]
    fn test_invalid_book_counts_as_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("broken.json"),
            r#"{"items": [], "recipes": [{"id": "r", "outputItemId": "x", "ingredients": []}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("garbage.json"), "{ not json").unwrap();

        let conn = memory_db();
        let stats = import_path(&conn, dir.path()).unwrap();
        assert_eq!(stats.files, 0);
        assert_eq!(stats.errors, 2);
        assert_eq!(db::catalog_counts(&conn).unwrap(), (0, 0));
    }
}
