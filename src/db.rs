//! Database schema and operations

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Catalog, CatalogMeta, Ingredient, Item, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item definitions; rowid keeps catalog order
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            category TEXT,
            craftable INTEGER NOT NULL DEFAULT 0,
            icon_url TEXT,
            description TEXT
        );

        -- Recipes; seq decides which alternative is the default
        CREATE TABLE IF NOT EXISTS recipes (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            output_item_id TEXT NOT NULL,
            output_quantity INTEGER NOT NULL DEFAULT 1,
            station TEXT,
            requirements TEXT
        );

        -- What a single craft consumes, in recipe order
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        -- Source metadata of the last imported recipe book
        CREATE TABLE IF NOT EXISTS catalog_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_output ON recipes(output_item_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_item ON recipe_ingredients(item_id);
        "#,
    )?;
    Ok(())
}

/// Insert or update an item, keeping its catalog position
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (id, name, normalized_name, category, craftable, icon_url, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            normalized_name = excluded.normalized_name,
            category = excluded.category,
            craftable = excluded.craftable,
            icon_url = excluded.icon_url,
            description = excluded.description",
        (
            &item.id,
            &item.name,
            &item.normalized_name,
            &item.category,
            item.craftable,
            &item.icon_url,
            &item.description,
        ),
    )?;
    Ok(())
}

/// Insert an item unless one with the same id exists; returns whether it was added
pub fn insert_item_if_absent(conn: &Connection, item: &Item) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO items (id, name, normalized_name, category, craftable, icon_url, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &item.id,
            &item.name,
            &item.normalized_name,
            &item.category,
            item.craftable,
            &item.icon_url,
            &item.description,
        ),
    )?;
    Ok(inserted > 0)
}

pub fn mark_craftable(conn: &Connection, item_id: &str) -> Result<()> {
    conn.execute("UPDATE items SET craftable = 1 WHERE id = ?1", [item_id])?;
    Ok(())
}

/// Insert or update a recipe and replace its ingredient list
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes (id, output_item_id, output_quantity, station, requirements)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            output_item_id = excluded.output_item_id,
            output_quantity = excluded.output_quantity,
            station = excluded.station,
            requirements = excluded.requirements",
        (
            &recipe.id,
            &recipe.output_item_id,
            recipe.output_quantity,
            &recipe.station,
            &recipe.requirements,
        ),
    )?;

    conn.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", [&recipe.id])?;
    for (position, ingredient) in recipe.ingredients.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, position, item_id, quantity)
             VALUES (?1, ?2, ?3, ?4)",
            (&recipe.id, position, &ingredient.item_id, ingredient.quantity),
        )?;
    }
    Ok(())
}

/// Whether a recipe for `output_item_id` at `station` is already stored
pub fn recipe_exists_for(conn: &Connection, output_item_id: &str, station: Option<&str>) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM recipes WHERE output_item_id = ?1 AND station IS ?2 LIMIT 1",
            (output_item_id, station),
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn set_meta(conn: &Connection, meta: &CatalogMeta) -> Result<()> {
    let entries = [
        ("scraped_at", meta.scraped_at.clone()),
        ("version", meta.version.clone()),
        ("source", meta.source.clone()),
        ("total_items", meta.total_items.to_string()),
        ("total_recipes", meta.total_recipes.to_string()),
    ];
    for (key, value) in entries {
        conn.execute(
            "INSERT OR REPLACE INTO catalog_meta (key, value) VALUES (?1, ?2)",
            (key, value),
        )?;
    }
    Ok(())
}

pub fn get_meta_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM catalog_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

/// Clear the whole catalog (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM items;
        DELETE FROM catalog_meta;
        "#,
    )?;
    Ok(())
}

/// Load the stored catalog, items and recipes in catalog order
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare(
        "SELECT id, name, normalized_name, category, craftable, icon_url, description
         FROM items ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Item {
            id: row.get(0)?,
            name: row.get(1)?,
            normalized_name: row.get(2)?,
            category: row.get(3)?,
            craftable: row.get(4)?,
            icon_url: row.get(5)?,
            description: row.get(6)?,
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, output_item_id, output_quantity, station, requirements
         FROM recipes ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Recipe {
            id: row.get(0)?,
            output_item_id: row.get(1)?,
            output_quantity: row.get(2)?,
            station: row.get(3)?,
            ingredients: Vec::new(),
            requirements: row.get(4)?,
        })
    })?;

    let mut recipes = Vec::new();
    for row in rows {
        let mut recipe = row?;
        recipe.ingredients = get_recipe_ingredients(conn, &recipe.id)?;
        recipes.push(recipe);
    }

    Ok(Catalog { items, recipes })
}

/// Get the ingredients of a recipe in order
pub fn get_recipe_ingredients(conn: &Connection, recipe_id: &str) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, quantity FROM recipe_ingredients
         WHERE recipe_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map([recipe_id], |row| {
        Ok(Ingredient {
            item_id: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Number of stored (items, recipes)
pub fn catalog_counts(conn: &Connection) -> Result<(usize, usize)> {
    let items: usize = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    let recipes: usize = conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
    Ok((items, recipes))
}
