use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::db::Database;
use crate::models::{
    DateWindow, ItemSource, NewShoppingListItem, Recipe, ShoppingListItem, UpdateShoppingListItem,
};
use crate::ports::{MealPlanQueue, RecipeSource, ShoppingListStore};

/// Cheaply cloneable handle over one connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` with exclusive access to the database.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|_| anyhow!("Database lock poisoned"))?;
        f(&db)
    }
}

#[async_trait]
impl ShoppingListStore for SqliteStore {
    async fn create_item(&self, input: &NewShoppingListItem) -> Result<ShoppingListItem> {
        self.with_db(|db| db.insert_shopping_item(input))
    }

    async fn create_bulk(&self, inputs: &[NewShoppingListItem]) -> Result<Vec<ShoppingListItem>> {
        self.with_db(|db| db.insert_shopping_items(inputs))
    }

    async fn get_all(&self) -> Result<Vec<ShoppingListItem>> {
        self.with_db(Database::list_shopping_items)
    }

    async fn update_checked_state(&self, id: &str, checked: bool) -> Result<ShoppingListItem> {
        self.with_db(|db| db.set_shopping_item_checked(id, checked))
    }

    async fn update_item(
        &self,
        id: &str,
        update: &UpdateShoppingListItem,
    ) -> Result<ShoppingListItem> {
        self.with_db(|db| db.update_shopping_item(id, update))
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.with_db(|db| db.delete_shopping_item(id).map(|_| ()))
    }

    async fn delete_items(&self, ids: &[String]) -> Result<()> {
        self.with_db(|db| db.delete_shopping_items(ids).map(|_| ()))
    }

    async fn delete_by_source(&self, source: ItemSource) -> Result<()> {
        self.with_db(|db| db.delete_shopping_items_by_source(source).map(|_| ()))
    }

    async fn delete_by_recipe_id(&self, recipe_id: &str) -> Result<()> {
        self.with_db(|db| db.delete_shopping_items_by_recipe(recipe_id).map(|_| ()))
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_db(|db| db.clear_shopping_items().map(|_| ()))
    }
}

#[async_trait]
impl RecipeSource for SqliteStore {
    async fn get_recipe(&self, recipe_id: &str) -> Result<Option<Recipe>> {
        self.with_db(|db| db.get_recipe(recipe_id))
    }
}

#[async_trait]
impl MealPlanQueue for SqliteStore {
    async fn queued_recipe_ids(&self, window: &DateWindow) -> Result<Vec<String>> {
        self.with_db(|db| db.queued_recipe_ids(window))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Ingredient, MeasurementUnit, NewMealPlanEntry, ShoppingListCategory};
    use crate::ports::load_queued_recipes;

    fn manual(name: &str, category: ShoppingListCategory) -> NewShoppingListItem {
        NewShoppingListItem {
            name: name.to_string(),
            quantity: None,
            unit: None,
            recipe_id: None,
            meal_plan_id: None,
            category,
            source: ItemSource::Manual,
            original_name: None,
        }
    }

    #[tokio::test]
    async fn test_get_all_by_category_groups_in_display_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_bulk(&[
                manual("tape", ShoppingListCategory::Other),
                manual("kale", ShoppingListCategory::Produce),
                manual("milk", ShoppingListCategory::Dairy),
            ])
            .await
            .unwrap();

        let grouped = store.get_all_by_category().await.unwrap();
        let keys: Vec<ShoppingListCategory> = grouped.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                ShoppingListCategory::Produce,
                ShoppingListCategory::Dairy,
                ShoppingListCategory::Other
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop_update_unknown_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.delete_item("missing").await.unwrap();
        let err = store.update_checked_state("missing", true).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_load_queued_recipes_through_ports() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let recipe_id = store
            .with_db(|db| {
                let recipe = db.create_recipe("Porridge")?;
                db.add_recipe_ingredient(
                    &recipe.id,
                    &Ingredient::new("oats", Some(1.0), Some(MeasurementUnit::Cup)),
                )?;
                db.add_meal_plan_entry(&NewMealPlanEntry {
                    recipe_id: recipe.id.clone(),
                    date: day,
                    meal_type: "breakfast".to_string(),
                })?;
                Ok(recipe.id)
            })
            .unwrap();

        let window = DateWindow::starting(day, 7);
        let recipes = load_queued_recipes(&store, &store, &window).await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].id, recipe_id);
        assert_eq!(recipes[0].ingredients[0].name, "oats");
    }
}
