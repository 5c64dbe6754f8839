use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use crate::coordinator::{CoordinatorConfig, CoordinatorPorts, ListCoordinator};
use crate::generator::ShoppingListGenerator;
use crate::models::{
    DateWindow, Ingredient, MealPlanEntry, NewMealPlanEntry, Recipe, RecipeSummary,
    ShoppingListItem,
};
use crate::ports::load_queued_recipes;
use crate::recipe_import::{self, RecipeImportSummary};
use crate::store::SqliteStore;

/// Entry point for front ends: recipe and meal-plan management plus
/// factories for the shopping-list generator and coordinator.
pub struct BasketService {
    store: SqliteStore,
}

impl BasketService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(Self {
            store: SqliteStore::open(db_path)?,
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self {
            store: SqliteStore::open_in_memory()?,
        })
    }

    // --- Recipes ---

    pub fn create_recipe(&self, name: &str) -> Result<Recipe> {
        self.store.with_db(|db| db.create_recipe(name))
    }

    pub fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        self.store.with_db(|db| db.get_recipe(id))
    }

    pub fn get_recipe_by_name(&self, name: &str) -> Result<Recipe> {
        self.store.with_db(|db| db.get_recipe_by_name(name))
    }

    pub fn add_recipe_ingredient(&self, recipe_id: &str, ingredient: &Ingredient) -> Result<Ingredient> {
        self.store
            .with_db(|db| db.add_recipe_ingredient(recipe_id, ingredient))
    }

    pub fn remove_recipe_ingredient(&self, recipe_id: &str, name: &str) -> Result<bool> {
        self.store
            .with_db(|db| db.remove_recipe_ingredient(recipe_id, name))
    }

    pub fn list_recipes(&self) -> Result<Vec<RecipeSummary>> {
        self.store.with_db(|db| db.list_recipes())
    }

    /// Delete a recipe, its plan entries and the list rows attributed to it.
    pub fn delete_recipe(&self, recipe_id: &str) -> Result<bool> {
        self.store.with_db(|db| {
            let deleted = db.delete_recipe(recipe_id)?;
            if deleted {
                db.delete_shopping_items_by_recipe(recipe_id)?;
            }
            Ok(deleted)
        })
    }

    pub fn import_recipe_csv(&self, csv_data: &str, dry_run: bool) -> Result<RecipeImportSummary> {
        let rows = recipe_import::parse_recipe_csv(csv_data.as_bytes())?;
        self.store
            .with_db(|db| recipe_import::import_recipes(db, &rows, dry_run))
    }

    // --- Meal plan ---

    pub fn plan_recipe(&self, recipe_id: &str, date: NaiveDate, meal_type: &str) -> Result<MealPlanEntry> {
        self.store.with_db(|db| {
            db.add_meal_plan_entry(&NewMealPlanEntry {
                recipe_id: recipe_id.to_string(),
                date,
                meal_type: meal_type.to_string(),
            })
        })
    }

    pub fn unplan_recipe(&self, recipe_id: &str, date: Option<NaiveDate>) -> Result<usize> {
        self.store
            .with_db(|db| db.remove_meal_plan_entries(recipe_id, date))
    }

    pub fn meal_plan(&self, window: &DateWindow) -> Result<Vec<MealPlanEntry>> {
        self.store.with_db(|db| db.get_meal_plan(window))
    }

    pub async fn queued_recipes(&self, window: &DateWindow) -> Result<Vec<Recipe>> {
        load_queued_recipes(&self.store, &self.store, window).await
    }

    // --- Shopping list ---

    #[must_use]
    pub fn generator(&self) -> ShoppingListGenerator {
        ShoppingListGenerator::new(Arc::new(self.store.clone()))
    }

    #[must_use]
    pub fn coordinator(&self, window: DateWindow, config: CoordinatorConfig) -> ListCoordinator {
        ListCoordinator::new(
            CoordinatorPorts::from_backend(self.store.clone()),
            window,
            config,
        )
    }

    pub fn shopping_list(&self) -> Result<Vec<ShoppingListItem>> {
        self.store.with_db(|db| db.list_shopping_items())
    }

    pub fn get_shopping_item(&self, id: &str) -> Result<ShoppingListItem> {
        self.store.with_db(|db| db.get_shopping_item(id))
    }

    /// Rebuild recipe rows from everything planned in `window`.
    pub async fn regenerate_from_plan(&self, window: &DateWindow) -> Result<Vec<ShoppingListItem>> {
        let recipes = self.queued_recipes(window).await?;
        self.generator().regenerate_list(&recipes).await
    }
}
