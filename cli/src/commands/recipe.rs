use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use basket_core::models::{Ingredient, MeasurementUnit, RecipeSummary};
use basket_core::recipe_import::parse_quantity;
use basket_core::service::BasketService;
use basket_core::units::format_quantity;

use super::helpers::{json_error, parse_amount, print_json, truncate};

pub(crate) fn cmd_recipe_create(svc: &BasketService, name: &str, json: bool) -> Result<()> {
    let recipe = svc.create_recipe(name)?;
    if json {
        print_json(&recipe)?;
    } else {
        let rname = &recipe.name;
        println!("Created recipe: {rname}");
        println!("Add ingredients with: basket recipe add-ingredient \"{rname}\" <ingredient> [quantity]");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add_ingredient(
    svc: &BasketService,
    recipe_name: &str,
    ingredient_name: &str,
    quantity: Option<&str>,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    let (quantity, unit) = match quantity {
        Some(q) => {
            let (qty, unit) = parse_amount(q)?;
            (Some(qty), unit)
        }
        None => (None, None),
    };

    let ingredient =
        svc.add_recipe_ingredient(&recipe.id, &Ingredient::new(ingredient_name, quantity, unit))?;

    if json {
        print_json(&ingredient)?;
    } else {
        let amount = format_quantity(ingredient.quantity, ingredient.unit);
        let iname = &ingredient.name;
        let rname = &recipe.name;
        if amount.is_empty() {
            println!("Added {iname} to {rname}");
        } else {
            println!("Added {amount} {iname} to {rname}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_remove_ingredient(
    svc: &BasketService,
    recipe_name: &str,
    ingredient_name: &str,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    if svc.remove_recipe_ingredient(&recipe.id, ingredient_name)? {
        if json {
            println!("{}", serde_json::json!({ "removed": ingredient_name }));
        } else {
            println!("Removed {ingredient_name} from {}", recipe.name);
        }
    } else {
        let message = format!("Ingredient '{ingredient_name}' not found in recipe");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &BasketService, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;

    if json {
        return print_json(&recipe);
    }

    println!("=== {} ===", recipe.name);
    if recipe.ingredients.is_empty() {
        println!("  (no ingredients)");
        return Ok(());
    }
    println!("  INGREDIENTS:");
    for ing in &recipe.ingredients {
        let amount = format_quantity(ing.quantity, ing.unit);
        if amount.is_empty() {
            println!("    {}", ing.name);
        } else {
            println!("    {} - {amount}", ing.name);
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct RecipeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Ingredients")]
    ingredients: i64,
    #[tabled(rename = "Planned")]
    planned: i64,
}

fn recipe_rows(recipes: &[RecipeSummary]) -> Vec<RecipeRow> {
    recipes
        .iter()
        .map(|r| RecipeRow {
            name: truncate(&r.name, 40),
            ingredients: r.ingredient_count,
            planned: r.planned_count,
        })
        .collect()
}

pub(crate) fn cmd_recipe_list(svc: &BasketService, json: bool) -> Result<()> {
    let recipes = svc.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    if json {
        return print_json(&recipes);
    }

    let table = Table::new(recipe_rows(&recipes))
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &BasketService, recipe_name: &str, json: bool) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    svc.delete_recipe(&recipe.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": recipe.id }));
    } else {
        println!("Deleted recipe {}", recipe.name);
    }
    Ok(())
}

/// Import recipes from a CSV file (`Recipe,Ingredient,Quantity,Unit`) or a
/// single recipe from a Cooklang `.cook` file.
pub(crate) fn cmd_recipe_import(
    svc: &BasketService,
    file: &Path,
    name_override: Option<String>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let is_csv = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        if name_override.is_some() {
            bail!("--name only applies to Cooklang files");
        }
        let summary = svc.import_recipe_csv(&input, dry_run)?;
        if json {
            print_json(&summary)?;
        } else {
            let prefix = if dry_run { "Would import" } else { "Imported" };
            println!(
                "{prefix} {} ingredients: {} new recipes, {} existing recipes extended",
                summary.ingredients_added, summary.recipes_created, summary.recipes_reused
            );
        }
        return Ok(());
    }

    let (recipe_data, _report) = cooklang::parse(&input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let name = name_override
        .or_else(|| recipe_data.metadata.title().map(String::from))
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe name. Use --name to specify one")?;

    let converter = cooklang::Converter::default();
    let ingredients: Vec<Ingredient> = recipe_data
        .group_ingredients(&converter)
        .iter()
        .map(cooklang_ingredient)
        .collect();

    if ingredients.is_empty() {
        bail!("No ingredients found in recipe");
    }

    if dry_run {
        if json {
            println!("{}", serde_json::json!({ "name": name, "ingredients": ingredients }));
        } else {
            println!("Would import recipe: {name} ({} ingredients)", ingredients.len());
        }
        return Ok(());
    }

    let recipe = svc.create_recipe(&name)?;
    for ingredient in &ingredients {
        svc.add_recipe_ingredient(&recipe.id, ingredient)?;
    }

    let recipe = svc.get_recipe_by_name(&recipe.name)?;
    if json {
        print_json(&recipe)?;
    } else {
        println!(
            "Imported recipe: {} ({} ingredients)",
            recipe.name,
            recipe.ingredients.len()
        );
    }
    Ok(())
}

fn cooklang_ingredient(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> Ingredient {
    let name = gi.ingredient.display_name().to_string();

    // Only the first grouped quantity is carried over
    let Some(qty) = gi.quantity.iter().next() else {
        return Ingredient::new(name, None, None);
    };
    let value = match qty.value() {
        cooklang::Value::Number(n) => Some(n.value()),
        cooklang::Value::Range { start, .. } => Some(start.value()),
        cooklang::Value::Text(t) => parse_quantity(t).ok(),
    };

    match qty.unit() {
        None => Ingredient::new(name, value, None),
        Some(unit) => match unit.parse::<MeasurementUnit>() {
            Ok(unit) => Ingredient::new(name, value, Some(unit)),
            Err(_) => {
                tracing::debug!(ingredient = %name, unit, "unrecognized Cooklang unit kept in name");
                Ingredient::new(format!("{name} ({unit})"), value, None)
            }
        },
    }
}
