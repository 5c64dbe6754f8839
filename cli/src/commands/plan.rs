use anyhow::Result;
use chrono::Local;
use tabled::{Table, Tabled, settings::Style};

use basket_core::coordinator::{CoordinatorConfig, ListCoordinator};
use basket_core::models::DateWindow;
use basket_core::service::BasketService;

use super::helpers::{parse_date, print_json, truncate};

/// Window the shopping list is built from: `days` days starting today.
pub(crate) fn plan_window(days: u32) -> DateWindow {
    DateWindow::starting(Local::now().date_naive(), days)
}

/// Rebuild the list through the debounced path and wait for it to settle.
async fn sync_list(coordinator: &ListCoordinator) -> Result<usize> {
    coordinator.schedule_regeneration();
    coordinator.flush().await?;
    Ok(coordinator.state().items.len())
}

pub(crate) async fn cmd_plan_add(
    svc: &BasketService,
    config: CoordinatorConfig,
    plan_days: u32,
    recipe_name: &str,
    date: Option<String>,
    meal: &str,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    let date = parse_date(date)?;
    let entry = svc.plan_recipe(&recipe.id, date, meal)?;

    let coordinator = svc.coordinator(plan_window(plan_days), config);
    let items = sync_list(&coordinator).await?;

    if json {
        print_json(&entry)?;
    } else {
        println!(
            "Planned {} for {} on {}",
            recipe.name,
            entry.meal_type,
            entry.date.format("%Y-%m-%d")
        );
        if coordinator.window().contains(date) {
            println!("Shopping list now has {items} items");
        } else {
            eprintln!(
                "Note: {} is outside the current {plan_days}-day shopping window",
                date.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}

pub(crate) async fn cmd_plan_remove(
    svc: &BasketService,
    config: CoordinatorConfig,
    plan_days: u32,
    recipe_name: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    let date = date.map(|d| parse_date(Some(d))).transpose()?;
    let removed = svc.unplan_recipe(&recipe.id, date)?;

    let coordinator = svc.coordinator(plan_window(plan_days), config);
    let items = sync_list(&coordinator).await?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed, "items": items }));
    } else if removed == 0 {
        eprintln!("{} was not planned", recipe.name);
    } else {
        println!("Removed {removed} plan entries for {}", recipe.name);
        println!("Shopping list now has {items} items");
    }
    Ok(())
}

pub(crate) fn cmd_plan_show(svc: &BasketService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
    }

    let window = plan_window(days);
    let entries = svc.meal_plan(&window)?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        eprintln!(
            "Nothing planned between {} and {}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );
        return Ok(());
    }

    let rows: Vec<PlanRow> = entries
        .iter()
        .map(|e| PlanRow {
            date: e.date.format("%a %Y-%m-%d").to_string(),
            meal: e.meal_type.clone(),
            recipe: truncate(e.recipe_name.as_deref().unwrap_or("?"), 40),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}
