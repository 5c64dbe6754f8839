use std::collections::HashMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::warn;

use crate::db::Database;
use crate::models::{Ingredient, MeasurementUnit};

/// A single ingredient line parsed from a recipe CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub recipe: String,
    pub ingredient: Ingredient,
}

/// Summary of what a recipe import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipeImportSummary {
    pub rows_parsed: usize,
    pub recipes_created: usize,
    pub recipes_reused: usize,
    pub ingredients_added: usize,
}

/// Parse a recipe CSV from any reader.
///
/// Expected header: `Recipe,Ingredient,Quantity,Unit`. Quantity and Unit are
/// optional columns. A unit that isn't recognized stays with the ingredient
/// name as `name (unit)` so nothing the author wrote is dropped.
pub fn parse_recipe_csv<R: Read>(reader: R) -> Result<Vec<RecipeRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let required = ["Recipe", "Ingredient"];
    for name in &required {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_recipe = col("Recipe").context("Missing 'Recipe' column")?;
    let idx_ingredient = col("Ingredient").context("Missing 'Ingredient' column")?;
    let idx_quantity = col("Quantity");
    let idx_unit = col("Unit");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

        let recipe = field(Some(idx_recipe));
        let name = field(Some(idx_ingredient));
        if recipe.is_empty() || name.is_empty() {
            if !recipe.is_empty() || !name.is_empty() {
                warn!(line, "skipping row without both a recipe and an ingredient");
            }
            continue;
        }

        let quantity_text = field(idx_quantity);
        let quantity = if quantity_text.is_empty() {
            None
        } else {
            Some(parse_quantity(quantity_text).with_context(|| {
                format!("Invalid quantity '{quantity_text}' on row {line}")
            })?)
        };

        let unit_text = field(idx_unit);
        let (name, unit) = if unit_text.is_empty() {
            (name.to_string(), None)
        } else {
            match unit_text.parse::<MeasurementUnit>() {
                Ok(unit) => (name.to_string(), Some(unit)),
                Err(_) => (format!("{name} ({unit_text})"), None),
            }
        };

        rows.push(RecipeRow {
            recipe: recipe.to_string(),
            ingredient: Ingredient::new(name, quantity, unit),
        });
    }

    Ok(rows)
}

/// Parse `2`, `0.5`, `1/2` or `1 1/2`.
pub fn parse_quantity(text: &str) -> Result<f64> {
    let text = text.trim();
    let mut total = 0.0;
    let mut parts = 0;
    for part in text.split_whitespace() {
        parts += 1;
        let value = match part.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().with_context(|| format!("Cannot parse '{text}'"))?;
                let den: f64 = den.parse().with_context(|| format!("Cannot parse '{text}'"))?;
                if den == 0.0 {
                    bail!("Cannot parse '{text}': division by zero");
                }
                num / den
            }
            None => part.parse().with_context(|| format!("Cannot parse '{text}'"))?,
        };
        total += value;
    }
    if parts == 0 || parts > 2 {
        bail!("Cannot parse quantity '{text}'");
    }
    if !total.is_finite() || total < 0.0 {
        bail!("Quantity must be a non-negative number");
    }
    Ok(total)
}

/// Import parsed rows into the database, grouping them by recipe name.
///
/// A recipe that already exists (case-insensitive name match) gets the new
/// ingredients appended. When `dry_run` is true, no data is written.
pub fn import_recipes(db: &Database, rows: &[RecipeRow], dry_run: bool) -> Result<RecipeImportSummary> {
    let mut summary = RecipeImportSummary {
        rows_parsed: rows.len(),
        ..Default::default()
    };

    // Cache: lowercase recipe name → recipe id (None for recipes a dry run would create)
    let mut recipe_cache: HashMap<String, Option<String>> = HashMap::new();

    for row in rows {
        let key = row.recipe.to_lowercase();
        let recipe_id = if let Some(id) = recipe_cache.get(&key) {
            id.clone()
        } else {
            let id = match db.find_recipe_by_name(&row.recipe)? {
                Some(existing) => {
                    summary.recipes_reused += 1;
                    Some(existing.id)
                }
                None if dry_run => {
                    summary.recipes_created += 1;
                    None
                }
                None => {
                    summary.recipes_created += 1;
                    Some(db.create_recipe(&row.recipe)?.id)
                }
            };
            recipe_cache.insert(key, id.clone());
            id
        };

        if !dry_run {
            if let Some(recipe_id) = recipe_id {
                db.add_recipe_ingredient(&recipe_id, &row.ingredient)?;
            }
        }
        summary.ingredients_added += 1;
    }

    Ok(summary)
}
