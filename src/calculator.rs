//! Crafting tree resolution and material aggregation

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::index::CatalogIndex;
use crate::models::{
    Catalog, CraftingNode, CraftingResult, Diagnostic, Item, MaterialTotal, MaterialTotals, Recipe,
    RecipeOverrides,
};

/// Recursion bound for pathological recipe graphs
pub const MAX_DEPTH: usize = 50;

/// Resolves crafting trees against an immutable catalog
///
/// Every query is independent: the resolver holds no per-query state, so a
/// shared reference can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct CraftingResolver {
    index: CatalogIndex,
}

impl CraftingResolver {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            index: CatalogIndex::new(catalog),
        }
    }

    pub fn get_item(&self, item_id: &str) -> Option<&Item> {
        self.index.get_item(item_id)
    }

    pub fn get_recipes(&self, item_id: &str) -> Vec<&Recipe> {
        self.index.get_recipes(item_id)
    }

    pub fn get_recipe_by_id(&self, recipe_id: &str) -> Option<&Recipe> {
        self.index.get_recipe_by_id(recipe_id)
    }

    /// Resolve the crafting tree for `quantity` units of `target_item_id`
    ///
    /// Fails only when the target, or an ingredient reached while expanding it,
    /// is missing from the catalog. Cycles, the depth limit and unknown overrides
    /// are reported through `CraftingResult::diagnostics`.
    pub fn resolve(
        &self,
        target_item_id: &str,
        quantity: u64,
        overrides: &RecipeOverrides,
    ) -> Result<CraftingResult, ResolveError> {
        let mut diagnostics = Vec::new();
        let tree = self.build_tree(
            target_item_id,
            quantity,
            overrides,
            &HashSet::new(),
            0,
            &mut diagnostics,
        )?;

        let mut totals = MaterialTotals::new();
        let mut base_materials_only = MaterialTotals::new();
        let mut by_station = BTreeMap::new();
        aggregate_materials(&tree, &mut totals, &mut base_materials_only, &mut by_station)?;

        debug!(
            "Resolved {} x{}: {} distinct items, {} base materials",
            target_item_id,
            quantity,
            totals.len(),
            base_materials_only.len()
        );

        Ok(CraftingResult {
            tree,
            totals,
            base_materials_only,
            by_station,
            diagnostics,
        })
    }

    fn build_tree(
        &self,
        item_id: &str,
        required_quantity: u64,
        overrides: &RecipeOverrides,
        path: &HashSet<String>,
        depth: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<CraftingNode, ResolveError> {
        // `path` holds only this node's ancestors; siblings never see each other's entries
        if path.contains(item_id) {
            warn!("Cycle detected for item: {}", item_id);
            diagnostics.push(Diagnostic::Cycle {
                item_id: item_id.to_string(),
            });
            return Ok(self.degraded_leaf(item_id, required_quantity));
        }

        if depth > MAX_DEPTH {
            warn!("Max depth exceeded for item: {}", item_id);
            diagnostics.push(Diagnostic::DepthLimit {
                item_id: item_id.to_string(),
            });
            return Ok(self.degraded_leaf(item_id, required_quantity));
        }

        let item = self
            .index
            .get_item(item_id)
            .ok_or_else(|| ResolveError::ItemNotFound(item_id.to_string()))?;

        let Some(default_recipe) = self.index.default_recipe(item_id).filter(|_| item.craftable)
        else {
            return Ok(CraftingNode::base_material(item_id, &item.name, required_quantity));
        };

        let recipe = match overrides.get(item_id) {
            Some(recipe_id) => match self
                .index
                .get_recipe_by_id(recipe_id)
                .filter(|r| r.output_item_id == item_id)
            {
                Some(recipe) => recipe,
                None => {
                    warn!("Override recipe not found: {}, using default", recipe_id);
                    diagnostics.push(Diagnostic::OverrideNotFound {
                        item_id: item_id.to_string(),
                        recipe_id: recipe_id.clone(),
                    });
                    default_recipe
                }
            },
            None => default_recipe,
        };

        // Batches are whole: any remainder costs a full extra craft, surplus is not tracked
        let crafts_needed = required_quantity.div_ceil(recipe.output_quantity);

        let mut child_path = path.clone();
        child_path.insert(item_id.to_string());

        let mut children = Vec::with_capacity(recipe.ingredients.len());
        for ingredient in &recipe.ingredients {
            let child_quantity = crafts_needed
                .checked_mul(ingredient.quantity)
                .ok_or_else(|| ResolveError::QuantityOverflow(ingredient.item_id.clone()))?;
            let child = self.build_tree(
                &ingredient.item_id,
                child_quantity,
                overrides,
                &child_path,
                depth + 1,
                diagnostics,
            )?;
            children.push(child);
        }

        Ok(CraftingNode {
            item_id: item_id.to_string(),
            item_name: item.name.clone(),
            required_quantity,
            per_craft: recipe.output_quantity,
            crafts_needed,
            recipe_id: Some(recipe.id.clone()),
            station: recipe.station.clone(),
            is_base_material: false,
            children,
        })
    }

    fn degraded_leaf(&self, item_id: &str, required_quantity: u64) -> CraftingNode {
        let name = self
            .index
            .get_item(item_id)
            .map_or(item_id, |item| item.name.as_str());
        CraftingNode::base_material(item_id, name, required_quantity)
    }

    /// All (item, recipe) pairs whose recipe consumes `item_id`
    pub fn get_used_by(&self, item_id: &str) -> Vec<(&Item, &Recipe)> {
        self.index
            .recipes()
            .iter()
            .filter(|recipe| recipe.ingredients.iter().any(|ing| ing.item_id == item_id))
            .filter_map(|recipe| {
                self.index
                    .get_item(&recipe.output_item_id)
                    .map(|item| (item, recipe))
            })
            .collect()
    }

    /// Case-insensitive substring search over item names
    pub fn search_items(&self, query: &str) -> Vec<&Item> {
        let query = query.to_lowercase();
        self.index
            .items()
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains(&query)
                    || item.normalized_name.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Distinct main categories ("Weapons - Swords" counts as "Weapons"), sorted
    pub fn get_categories(&self) -> Vec<String> {
        let categories: BTreeSet<&str> = self
            .index
            .items()
            .iter()
            .filter_map(|item| item.category.as_deref())
            .map(main_category)
            .collect();
        categories.into_iter().map(str::to_string).collect()
    }

    pub fn get_items_by_category(&self, category: &str) -> Vec<&Item> {
        self.index
            .items()
            .iter()
            .filter(|item| {
                item.category
                    .as_deref()
                    .is_some_and(|c| c == category || main_category(c) == category)
            })
            .collect()
    }

    pub fn get_all_items(&self) -> &[Item] {
        self.index.items()
    }
}

fn main_category(category: &str) -> &str {
    category.split(" - ").next().unwrap_or(category)
}

fn aggregate_materials(
    node: &CraftingNode,
    totals: &mut MaterialTotals,
    base_materials_only: &mut MaterialTotals,
    by_station: &mut BTreeMap<String, MaterialTotals>,
) -> Result<(), ResolveError> {
    let total = totals
        .entry(node.item_id.clone())
        .or_insert_with(|| MaterialTotal {
            quantity: 0,
            item_name: node.item_name.clone(),
            is_base_material: node.is_base_material,
            station: node.station.clone(),
        });
    add_quantity(total, node)?;

    if node.is_base_material {
        let total = base_materials_only
            .entry(node.item_id.clone())
            .or_insert_with(|| MaterialTotal {
                quantity: 0,
                item_name: node.item_name.clone(),
                is_base_material: true,
                station: None,
            });
        add_quantity(total, node)?;
    }

    if let Some(station) = &node.station {
        let total = by_station
            .entry(station.clone())
            .or_default()
            .entry(node.item_id.clone())
            .or_insert_with(|| MaterialTotal {
                quantity: 0,
                item_name: node.item_name.clone(),
                is_base_material: node.is_base_material,
                station: Some(station.clone()),
            });
        add_quantity(total, node)?;
    }

    for child in &node.children {
        aggregate_materials(child, totals, base_materials_only, by_station)?;
    }
    Ok(())
}

fn add_quantity(total: &mut MaterialTotal, node: &CraftingNode) -> Result<(), ResolveError> {
    total.quantity = total
        .quantity
        .checked_add(node.required_quantity)
        .ok_or_else(|| ResolveError::QuantityOverflow(node.item_id.clone()))?;
    Ok(())
}

/// Format a crafting tree as a readable string
pub fn format_crafting_tree(node: &CraftingNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    if node.is_base_material {
        output.push_str(&format!(
            "{}{}x {} (base material)\n",
            prefix, node.required_quantity, node.item_name
        ));
    } else {
        let station = node
            .station
            .as_deref()
            .map(|s| format!(" [{}]", s))
            .unwrap_or_default();
        let crafts = if node.crafts_needed == 1 { "craft" } else { "crafts" };

        output.push_str(&format!(
            "{}{}x {}{} ({} {} of {})\n",
            prefix,
            node.required_quantity,
            node.item_name,
            station,
            node.crafts_needed,
            crafts,
            node.per_craft
        ));

        for child in &node.children {
            output.push_str(&format_crafting_tree(child, indent + 1));
        }
    }

    output
}

/// Summary of a crafting resolution
#[derive(Debug)]
pub struct CraftingSummary {
    pub target_item: String,
    pub target_quantity: u64,
    pub total_crafts: u64,
    pub stations: Vec<(String, Vec<(String, u64)>)>,
    pub unstationed: Vec<(String, u64)>,
    pub base_materials: Vec<(String, u64)>,
    pub warnings: Vec<String>,
}

/// Generate a summary of a crafting result
pub fn summarize(result: &CraftingResult, target_quantity: u64) -> CraftingSummary {
    let mut total_crafts = 0;
    let mut unstationed: BTreeMap<String, u64> = BTreeMap::new();
    collect_crafts(&result.tree, &mut total_crafts, &mut unstationed);

    let stations = result
        .by_station
        .iter()
        .map(|(station, totals)| {
            let items: Vec<_> = totals
                .values()
                .map(|t| (t.item_name.clone(), t.quantity))
                .collect();
            (station.clone(), items)
        })
        .collect();

    let base_materials = result
        .base_materials_only
        .values()
        .map(|t| (t.item_name.clone(), t.quantity))
        .collect();

    CraftingSummary {
        target_item: result.tree.item_name.clone(),
        target_quantity,
        total_crafts,
        stations,
        unstationed: unstationed.into_iter().collect(),
        base_materials,
        warnings: result.diagnostics.iter().map(ToString::to_string).collect(),
    }
}

fn collect_crafts(
    node: &CraftingNode,
    total_crafts: &mut u64,
    unstationed: &mut BTreeMap<String, u64>,
) {
    if node.is_base_material {
        return;
    }

    *total_crafts = total_crafts.saturating_add(node.crafts_needed);
    if node.station.is_none() {
        let quantity = unstationed.entry(node.item_name.clone()).or_default();
        *quantity = quantity.saturating_add(node.required_quantity);
    }

    for child in &node.children {
        collect_crafts(child, total_crafts, unstationed);
    }
}

impl std::fmt::Display for CraftingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Crafting Summary ===")?;
        writeln!(f, "Target: {}x {}", self.target_quantity, self.target_item)?;
        writeln!(f, "Total crafts: {}", self.total_crafts)?;
        writeln!(f)?;

        if !self.stations.is_empty() {
            writeln!(f, "By station:")?;
            for (station, items) in &self.stations {
                writeln!(f, "  {}:", station)?;
                for (name, quantity) in items {
                    writeln!(f, "    {}x {}", quantity, name)?;
                }
            }
            writeln!(f)?;
        }

        if !self.unstationed.is_empty() {
            writeln!(f, "Crafted without a station:")?;
            for (name, quantity) in &self.unstationed {
                writeln!(f, "  {}x {}", quantity, name)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Base materials:")?;
        for (name, quantity) in &self.base_materials {
            writeln!(f, "  {}x {}", quantity, name)?;
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  {}", warning)?;
            }
        }

        Ok(())
    }
}
