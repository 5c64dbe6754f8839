use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    DateWindow, ItemSource, NewShoppingListItem, Recipe, ShoppingListCategory, ShoppingListItem,
    UpdateShoppingListItem,
};

/// Persisted shopping-list rows.
///
/// Implementations scope every call to the current user themselves; callers
/// never pass user identifiers.
#[async_trait]
pub trait ShoppingListStore: Send + Sync {
    async fn create_item(&self, input: &NewShoppingListItem) -> Result<ShoppingListItem>;

    /// All-or-nothing bulk insert.
    async fn create_bulk(&self, inputs: &[NewShoppingListItem]) -> Result<Vec<ShoppingListItem>>;

    async fn get_all(&self) -> Result<Vec<ShoppingListItem>>;

    async fn get_all_by_category(
        &self,
    ) -> Result<BTreeMap<ShoppingListCategory, Vec<ShoppingListItem>>> {
        Ok(group_by_category(self.get_all().await?))
    }

    async fn update_checked_state(&self, id: &str, checked: bool) -> Result<ShoppingListItem>;

    async fn update_item(
        &self,
        id: &str,
        update: &UpdateShoppingListItem,
    ) -> Result<ShoppingListItem>;

    async fn delete_item(&self, id: &str) -> Result<()>;

    /// All-or-nothing delete of several rows. Unknown ids are ignored.
    async fn delete_items(&self, ids: &[String]) -> Result<()>;

    async fn delete_by_source(&self, source: ItemSource) -> Result<()>;

    async fn delete_by_recipe_id(&self, recipe_id: &str) -> Result<()>;

    async fn clear_all(&self) -> Result<()>;
}

/// Look up a recipe's ordered ingredient list.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn get_recipe(&self, recipe_id: &str) -> Result<Option<Recipe>>;
}

/// The meal-plan queue: which recipes are planned in a date window.
#[async_trait]
pub trait MealPlanQueue: Send + Sync {
    /// Distinct recipe ids, first-planned first.
    async fn queued_recipe_ids(&self, window: &DateWindow) -> Result<Vec<String>>;
}

/// Group items under their categories; the map iterates in display order.
#[must_use]
pub fn group_by_category(
    items: Vec<ShoppingListItem>,
) -> BTreeMap<ShoppingListCategory, Vec<ShoppingListItem>> {
    let mut grouped: BTreeMap<ShoppingListCategory, Vec<ShoppingListItem>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.category).or_default().push(item);
    }
    grouped
}

/// Resolve every queued recipe in `window`. Ids that no longer resolve are skipped.
pub async fn load_queued_recipes(
    queue: &dyn MealPlanQueue,
    recipes: &dyn RecipeSource,
    window: &DateWindow,
) -> Result<Vec<Recipe>> {
    let ids = queue.queued_recipe_ids(window).await?;
    let mut loaded = Vec::with_capacity(ids.len());
    for id in &ids {
        match recipes.get_recipe(id).await? {
            Some(recipe) => loaded.push(recipe),
            None => tracing::warn!(recipe_id = %id, "queued recipe not found, skipping"),
        }
    }
    Ok(loaded)
}
