use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::models::{
    Ingredient, ItemSource, MeasurementUnit, NewShoppingListItem, Recipe, ShoppingListItem,
    UpdateShoppingListItem,
};
use crate::ports::ShoppingListStore;
use crate::store::SqliteStore;

/// In-memory SQLite store that logs every port call and fails on demand.
pub(crate) struct RecordingStore {
    pub inner: SqliteStore,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every later call to `op` fail until [`RecordingStore::recover`].
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    fn record(&self, op: &'static str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(op) {
            bail!("simulated {op} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ShoppingListStore for RecordingStore {
    async fn create_item(&self, input: &NewShoppingListItem) -> Result<ShoppingListItem> {
        self.record("create_item", format!("create_item({})", input.name))?;
        self.inner.create_item(input).await
    }

    async fn create_bulk(&self, inputs: &[NewShoppingListItem]) -> Result<Vec<ShoppingListItem>> {
        self.record("create_bulk", format!("create_bulk({})", inputs.len()))?;
        self.inner.create_bulk(inputs).await
    }

    async fn get_all(&self) -> Result<Vec<ShoppingListItem>> {
        self.record("get_all", "get_all".to_string())?;
        self.inner.get_all().await
    }

    async fn update_checked_state(&self, id: &str, checked: bool) -> Result<ShoppingListItem> {
        self.record("update_checked_state", format!("update_checked_state({checked})"))?;
        self.inner.update_checked_state(id, checked).await
    }

    async fn update_item(
        &self,
        id: &str,
        update: &UpdateShoppingListItem,
    ) -> Result<ShoppingListItem> {
        self.record("update_item", "update_item".to_string())?;
        self.inner.update_item(id, update).await
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.record("delete_item", "delete_item".to_string())?;
        self.inner.delete_item(id).await
    }

    async fn delete_items(&self, ids: &[String]) -> Result<()> {
        self.record("delete_items", format!("delete_items({})", ids.len()))?;
        self.inner.delete_items(ids).await
    }

    async fn delete_by_source(&self, source: ItemSource) -> Result<()> {
        self.record("delete_by_source", format!("delete_by_source({source})"))?;
        self.inner.delete_by_source(source).await
    }

    async fn delete_by_recipe_id(&self, recipe_id: &str) -> Result<()> {
        self.record("delete_by_recipe_id", format!("delete_by_recipe_id({recipe_id})"))?;
        self.inner.delete_by_recipe_id(recipe_id).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.record("clear_all", "clear_all".to_string())?;
        self.inner.clear_all().await
    }
}

pub(crate) fn recipe(id: &str, ingredients: &[(&str, Option<f64>, Option<MeasurementUnit>)]) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: id.to_uppercase(),
        ingredients: ingredients
            .iter()
            .map(|(name, quantity, unit)| Ingredient::new(*name, *quantity, *unit))
            .collect(),
        created_at: String::new(),
    }
}
