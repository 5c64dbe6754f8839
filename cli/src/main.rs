mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ExportFormat, ListOptions, cmd_list_add, cmd_list_add_recipe, cmd_list_check, cmd_list_clear,
    cmd_list_delete, cmd_list_export, cmd_list_regenerate, cmd_list_remove_recipe, cmd_list_show,
    cmd_plan_add, cmd_plan_remove, cmd_plan_show, cmd_recipe_add_ingredient, cmd_recipe_create,
    cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list, cmd_recipe_remove_ingredient,
    cmd_recipe_show,
};
use crate::config::Config;
use basket_core::service::BasketService;

#[derive(Parser)]
#[command(
    name = "basket",
    version,
    about = "Plan meals, get a shopping list",
    long_about = "Plan meals from your recipes and get one merged, aisle-sorted shopping list.\n\n\
                  Set BASKET_DB to use a different database file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes and their ingredients
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage the meal plan the shopping list is built from
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Work with the shopping list
    List {
        /// If saving a change fails, retry it once before giving up
        #[arg(long, global = true)]
        retry: bool,
        #[command(subcommand)]
        command: ListCommands,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a new recipe
    Create {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient to a recipe
    AddIngredient {
        /// Recipe name
        recipe: String,
        /// Ingredient name as written in the recipe (e.g. "large eggs, beaten")
        ingredient: String,
        /// Quantity with optional unit (e.g. "2", "1 1/2 cups", "500g")
        quantity: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient from a recipe
    RemoveIngredient {
        /// Recipe name
        recipe: String,
        /// Ingredient name to remove
        ingredient: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe's ingredients
    Show {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe, its plan entries and its shopping list rows
    Delete {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import recipes from a CSV (Recipe,Ingredient,Quantity,Unit) or Cooklang (.cook) file
    Import {
        /// Path to the .csv or .cook file
        file: PathBuf,
        /// Recipe name override for Cooklang files (defaults to metadata title or filename)
        #[arg(long)]
        name: Option<String>,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Plan a recipe for a date and meal
    Add {
        /// Recipe name
        recipe: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "dinner")]
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe from the plan (from every date unless --date is given)
    Remove {
        /// Recipe name
        recipe: String,
        /// Only remove the entries on this date
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the upcoming meal plan
    Show {
        /// Number of days to show (default: BASKET_PLAN_DAYS or 7)
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Show the shopping list grouped by category
    Show {
        /// Hide items that are already checked off
        #[arg(long)]
        unchecked: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a manual item
    Add {
        /// Item name
        name: String,
        /// Quantity with optional unit (e.g. "2", "1 lb", "500ml")
        quantity: Option<String>,
        /// Category (produce, dairy, meat, pantry, frozen, bakery, other); guessed when omitted
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle an item's checked state
    Check {
        /// Item ID (or a unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an item
    Delete {
        /// Item ID (or a unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe's ingredients, merging into matching rows
    AddRecipe {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every row that came from a recipe
    RemoveRecipe {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild recipe rows from the meal plan (manual items are kept)
    Regenerate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove items from the list
    Clear {
        /// Only remove checked items
        #[arg(long)]
        checked: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the list for sharing or spreadsheets
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("basket=warn,basket_core=warn"));
    let json_logs = std::env::var("BASKET_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = BasketService::new(&config.db_path)?;
    let coord = config.coordinator;
    let days = config.plan_days;

    match cli.command {
        Commands::Recipe { command } => match command {
            RecipeCommands::Create { name, json } => cmd_recipe_create(&svc, &name, json),
            RecipeCommands::AddIngredient {
                recipe,
                ingredient,
                quantity,
                json,
            } => cmd_recipe_add_ingredient(&svc, &recipe, &ingredient, quantity.as_deref(), json),
            RecipeCommands::RemoveIngredient {
                recipe,
                ingredient,
                json,
            } => cmd_recipe_remove_ingredient(&svc, &recipe, &ingredient, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&svc, &recipe, json),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
            RecipeCommands::Delete { recipe, json } => cmd_recipe_delete(&svc, &recipe, json),
            RecipeCommands::Import {
                file,
                name,
                dry_run,
                json,
            } => cmd_recipe_import(&svc, &file, name, dry_run, json),
        },
        Commands::Plan { command } => match command {
            PlanCommands::Add {
                recipe,
                date,
                meal,
                json,
            } => cmd_plan_add(&svc, coord, days, &recipe, date, &meal, json).await,
            PlanCommands::Remove { recipe, date, json } => {
                cmd_plan_remove(&svc, coord, days, &recipe, date, json).await
            }
            PlanCommands::Show { days: shown, json } => {
                cmd_plan_show(&svc, shown.unwrap_or(days), json)
            }
        },
        Commands::List { retry, command } => {
            let opts = ListOptions {
                config: coord,
                plan_days: days,
                retry,
            };
            match command {
                ListCommands::Show { unchecked, json } => cmd_list_show(&svc, unchecked, json),
                ListCommands::Add {
                    name,
                    quantity,
                    category,
                    json,
                } => {
                    cmd_list_add(
                        &svc,
                        opts,
                        &name,
                        quantity.as_deref(),
                        category.as_deref(),
                        json,
                    )
                    .await
                }
                ListCommands::Check { id, json } => cmd_list_check(&svc, opts, &id, json).await,
                ListCommands::Delete { id, json } => cmd_list_delete(&svc, opts, &id, json).await,
                ListCommands::AddRecipe { recipe, json } => {
                    cmd_list_add_recipe(&svc, &recipe, json).await
                }
                ListCommands::RemoveRecipe { recipe, json } => {
                    cmd_list_remove_recipe(&svc, opts, &recipe, json).await
                }
                ListCommands::Regenerate { json } => cmd_list_regenerate(&svc, opts, json).await,
                ListCommands::Clear { checked, json } => {
                    cmd_list_clear(&svc, opts, checked, json).await
                }
                ListCommands::Export { format, output } => {
                    cmd_list_export(&svc, format, output.as_deref())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_add() {
        let cli = Cli::try_parse_from(["basket", "list", "add", "milk", "2 cups", "-c", "dairy"]).unwrap();
        match cli.command {
            Commands::List {
                retry,
                command:
                    ListCommands::Add {
                        name,
                        quantity,
                        category,
                        json,
                    },
            } => {
                assert_eq!(name, "milk");
                assert_eq!(quantity.as_deref(), Some("2 cups"));
                assert_eq!(category.as_deref(), Some("dairy"));
                assert!(!json);
                assert!(!retry);
            }
            _ => panic!("expected list add"),
        }
    }

    #[test]
    fn test_parse_retry_flag_either_side() {
        for args in [
            ["basket", "list", "--retry", "check", "abc"],
            ["basket", "list", "check", "abc", "--retry"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(matches!(
                cli.command,
                Commands::List {
                    retry: true,
                    command: ListCommands::Check { .. }
                }
            ));
        }
    }

    #[test]
    fn test_parse_export_format() {
        let cli = Cli::try_parse_from(["basket", "list", "export", "--format", "csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                retry: false,
                command: ListCommands::Export {
                    format: ExportFormat::Csv,
                    output: None
                }
            }
        ));
        assert!(Cli::try_parse_from(["basket", "list", "export", "--format", "pdf"]).is_err());
    }
}
