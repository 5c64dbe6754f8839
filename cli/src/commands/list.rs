use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::process;
use tracing::warn;

use basket_core::coordinator::{CoordinatorConfig, ListCoordinator};
use basket_core::error::is_validation_error;
use basket_core::export::{render_text, write_csv};
use basket_core::models::{NewManualItem, ShoppingListCategory};
use basket_core::service::BasketService;

use super::helpers::{parse_amount, print_items_table, print_json, resolve_item};
use super::plan::plan_window;

/// Output format for `list export`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ExportFormat {
    Csv,
    Text,
}

/// Settings shared by the list commands that go through the coordinator.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ListOptions {
    pub config: CoordinatorConfig,
    pub plan_days: u32,
    /// Replay a failed save once before reporting it.
    pub retry: bool,
}

/// Coordinator loaded with the persisted list.
async fn open_coordinator(svc: &BasketService, opts: ListOptions) -> Result<ListCoordinator> {
    let coordinator = svc.coordinator(plan_window(opts.plan_days), opts.config);
    coordinator.load().await?;
    Ok(coordinator)
}

/// Run a list action. A failed save is already rolled back by the
/// coordinator; with `retry` set it is replayed once before the error is
/// reported. Validation errors are never replayed.
async fn run_action<Fut>(coordinator: &ListCoordinator, retry: bool, action: Fut) -> Result<()>
where
    Fut: Future<Output = Result<()>>,
{
    let Err(err) = action.await else {
        return Ok(());
    };
    if !retry || is_validation_error(&err) {
        return Err(err);
    }
    warn!(error = %err, "save failed, retrying once");
    coordinator
        .retry_last()
        .await
        .with_context(|| format!("Retry after '{err}' failed"))
}

fn print_state(coordinator: &ListCoordinator, json: bool) -> Result<()> {
    let state = coordinator.state();
    if json {
        return print_json(&state.items);
    }
    if state.items.is_empty() {
        eprintln!("Shopping list is empty");
    } else {
        print_items_table(&state.items);
    }
    Ok(())
}

pub(crate) fn cmd_list_show(svc: &BasketService, unchecked_only: bool, json: bool) -> Result<()> {
    let mut items = svc.shopping_list()?;
    if unchecked_only {
        items.retain(|i| !i.checked);
    }

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        eprintln!("Shopping list is empty");
        process::exit(2);
    }
    print_items_table(&items);
    let checked = items.iter().filter(|i| i.checked).count();
    println!("{checked}/{} checked", items.len());
    Ok(())
}

pub(crate) async fn cmd_list_add(
    svc: &BasketService,
    opts: ListOptions,
    name: &str,
    quantity: Option<&str>,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let (quantity, unit) = match quantity {
        Some(q) => {
            let (qty, unit) = parse_amount(q)?;
            (Some(qty), unit)
        }
        None => (None, None),
    };
    let category = category
        .map(str::parse::<ShoppingListCategory>)
        .transpose()?;

    let coordinator = open_coordinator(svc, opts).await?;
    let input = NewManualItem {
        name: name.to_string(),
        quantity,
        unit,
        category,
    };
    run_action(&coordinator, opts.retry, coordinator.add_manual_item(input)).await?;

    if !json {
        println!("Added {}", name.trim());
    }
    print_state(&coordinator, json)
}

pub(crate) async fn cmd_list_check(
    svc: &BasketService,
    opts: ListOptions,
    id: &str,
    json: bool,
) -> Result<()> {
    let coordinator = open_coordinator(svc, opts).await?;
    let item = resolve_item(&coordinator.state().items, id)?.clone();
    run_action(&coordinator, opts.retry, coordinator.toggle_checked(&item.id)).await?;

    let checked = coordinator
        .state()
        .items
        .iter()
        .find(|i| i.id == item.id)
        .is_some_and(|i| i.checked);
    if json {
        println!("{}", serde_json::json!({ "id": item.id, "checked": checked }));
    } else if checked {
        println!("Checked off {}", item.name);
    } else {
        println!("Unchecked {}", item.name);
    }
    Ok(())
}

pub(crate) async fn cmd_list_delete(
    svc: &BasketService,
    opts: ListOptions,
    id: &str,
    json: bool,
) -> Result<()> {
    let coordinator = open_coordinator(svc, opts).await?;
    let item = resolve_item(&coordinator.state().items, id)?.clone();
    run_action(&coordinator, opts.retry, coordinator.delete_item(&item.id)).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": item.id }));
    } else {
        println!("Deleted {}", item.name);
    }
    Ok(())
}

pub(crate) async fn cmd_list_add_recipe(
    svc: &BasketService,
    recipe_name: &str,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    let created = svc.generator().add_recipe_to_shopping_list(&recipe).await?;

    if json {
        return print_json(&created);
    }
    let merged = recipe.ingredients.len().saturating_sub(created.len());
    println!(
        "Added {} to the list ({} new rows, {merged} merged into existing rows)",
        recipe.name,
        created.len()
    );
    Ok(())
}

pub(crate) async fn cmd_list_remove_recipe(
    svc: &BasketService,
    opts: ListOptions,
    recipe_name: &str,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(recipe_name)?;
    let coordinator = open_coordinator(svc, opts).await?;
    run_action(&coordinator, opts.retry, coordinator.remove_recipe(&recipe.id)).await?;

    if !json {
        println!("Removed {} items from the list", recipe.name);
    }
    print_state(&coordinator, json)
}

pub(crate) async fn cmd_list_regenerate(
    svc: &BasketService,
    opts: ListOptions,
    json: bool,
) -> Result<()> {
    let coordinator = open_coordinator(svc, opts).await?;
    run_action(&coordinator, opts.retry, coordinator.regenerate()).await?;
    print_state(&coordinator, json)
}

pub(crate) async fn cmd_list_clear(
    svc: &BasketService,
    opts: ListOptions,
    checked_only: bool,
    json: bool,
) -> Result<()> {
    let coordinator = open_coordinator(svc, opts).await?;
    let before = coordinator.state().items.len();
    if checked_only {
        run_action(&coordinator, opts.retry, coordinator.clear_checked()).await?;
    } else {
        run_action(&coordinator, opts.retry, coordinator.clear_all()).await?;
    }
    let removed = before.saturating_sub(coordinator.state().items.len());

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Removed {removed} items");
    }
    Ok(())
}

pub(crate) fn cmd_list_export(
    svc: &BasketService,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let items = svc.shopping_list()?;
    match (format, output) {
        (ExportFormat::Csv, Some(path)) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&items, file)?;
            eprintln!("Wrote {} items to {}", items.len(), path.display());
        }
        (ExportFormat::Csv, None) => write_csv(&items, std::io::stdout().lock())?,
        (ExportFormat::Text, Some(path)) => {
            std::fs::write(path, render_text(&items))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} items to {}", items.len(), path.display());
        }
        (ExportFormat::Text, None) => print!("{}", render_text(&items)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::error::CoordinatorError;

    fn options(retry: bool) -> ListOptions {
        ListOptions {
            config: CoordinatorConfig {
                max_retries: 2,
                ..CoordinatorConfig::default()
            },
            plan_days: 7,
            retry,
        }
    }

    /// Coordinator holding one item whose row was deleted behind its back,
    /// so saving a toggle fails in the store.
    async fn stale_item(svc: &BasketService, opts: ListOptions) -> (ListCoordinator, String) {
        svc.generator()
            .add_manual_item(NewManualItem {
                name: "milk".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let coordinator = open_coordinator(svc, opts).await.unwrap();
        let id = coordinator.state().items[0].id.clone();

        let other = open_coordinator(svc, opts).await.unwrap();
        other.delete_item(&id).await.unwrap();
        (coordinator, id)
    }

    fn is_retry_limit(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<CoordinatorError>(),
            Some(CoordinatorError::RetryLimitReached { max: 2 })
        )
    }

    #[tokio::test]
    async fn test_failed_save_is_not_retried_by_default() {
        let svc = BasketService::new_in_memory().unwrap();
        let opts = options(false);
        let (coordinator, id) = stale_item(&svc, opts).await;

        let err = run_action(&coordinator, opts.retry, coordinator.toggle_checked(&id))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!coordinator.state().items[0].checked);

        // The whole retry budget is still available
        for _ in 0..2 {
            let err = coordinator.retry_last().await.unwrap_err();
            assert!(!is_retry_limit(&err));
        }
        assert!(is_retry_limit(&coordinator.retry_last().await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_retry_flag_replays_once() {
        let svc = BasketService::new_in_memory().unwrap();
        let opts = options(true);
        let (coordinator, id) = stale_item(&svc, opts).await;

        let err = run_action(&coordinator, opts.retry, coordinator.toggle_checked(&id))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("Retry after"));

        assert!(!is_retry_limit(&coordinator.retry_last().await.unwrap_err()));
        assert!(is_retry_limit(&coordinator.retry_last().await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_validation_error_is_not_replayed() {
        let svc = BasketService::new_in_memory().unwrap();
        let coordinator = open_coordinator(&svc, options(true)).await.unwrap();
        let input = NewManualItem {
            name: "   ".to_string(),
            ..Default::default()
        };

        let err = run_action(&coordinator, true, coordinator.add_manual_item(input))
            .await
            .unwrap_err();
        assert!(is_validation_error(&err));
        let err = coordinator.retry_last().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CoordinatorError>(),
            Some(&CoordinatorError::NothingToRetry)
        );
    }
}
