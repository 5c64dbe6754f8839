use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::aggregate::{AggregatedIngredient, IngredientEntry, aggregate};
use crate::category::classify;
use crate::models::{
    Ingredient, ItemSource, NewManualItem, NewShoppingListItem, Recipe, ShoppingListItem,
    UpdateShoppingListItem, validate_item_name, validate_quantity,
};
use crate::normalize::normalize;
use crate::ports::ShoppingListStore;
use crate::units::{aggregate_quantities, are_compatible};

/// Stateless service over a [`ShoppingListStore`]. Clones share the store.
///
/// Recipe rows are reproducible from the meal-plan queue and may be rebuilt
/// at any time; manual rows are never touched by regeneration.
#[derive(Clone)]
pub struct ShoppingListGenerator {
    store: Arc<dyn ShoppingListStore>,
}

impl ShoppingListGenerator {
    pub fn new(store: Arc<dyn ShoppingListStore>) -> Self {
        Self { store }
    }

    /// Aggregate `recipes` and persist the result as recipe rows in one bulk insert.
    pub async fn generate_from_queue(&self, recipes: &[Recipe]) -> Result<Vec<ShoppingListItem>> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let entries = IngredientEntry::from_recipes(recipes);
        let records: Vec<NewShoppingListItem> = aggregate(&entries)
            .iter()
            .filter_map(creation_record)
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let created = self.store.create_bulk(&records).await?;
        debug!(
            recipes = recipes.len(),
            ingredients = entries.len(),
            created = created.len(),
            "generated shopping list"
        );
        Ok(created)
    }

    /// Rebuild the recipe section from `recipes`, leaving manual items alone.
    /// Returns the full list afterwards.
    pub async fn regenerate_list(&self, recipes: &[Recipe]) -> Result<Vec<ShoppingListItem>> {
        self.store.delete_by_source(ItemSource::Recipe).await?;
        self.generate_from_queue(recipes).await?;
        self.store.get_all().await
    }

    pub async fn add_manual_item(&self, input: NewManualItem) -> Result<ShoppingListItem> {
        let name = validate_item_name(&input.name)?;
        validate_quantity(input.quantity)?;

        let category = input.category.unwrap_or_else(|| classify(&name));
        let record = NewShoppingListItem {
            name,
            quantity: input.quantity,
            unit: input.unit,
            recipe_id: None,
            meal_plan_id: None,
            category,
            source: ItemSource::Manual,
            original_name: None,
        };
        let item = self.store.create_item(&record).await?;
        debug!(id = %item.id, category = %item.category, "added manual item");
        Ok(item)
    }

    /// Merge one recipe into the current list without a full regeneration.
    ///
    /// An ingredient whose normalized name matches an existing row is summed
    /// into that row when both sides carry a quantity in compatible units.
    /// Everything else becomes a new recipe row. Only the new rows are returned.
    pub async fn add_recipe_to_shopping_list(&self, recipe: &Recipe) -> Result<Vec<ShoppingListItem>> {
        if recipe.ingredients.is_empty() {
            return Ok(Vec::new());
        }

        let mut current = self.store.get_all().await?;
        let mut created = Vec::new();
        let mut merged = 0usize;

        for ingredient in &recipe.ingredients {
            let key = normalize(&ingredient.name);
            let Some(name) = item_name(&key, &ingredient.name) else {
                warn!(recipe_id = %recipe.id, "skipping ingredient with a blank name");
                continue;
            };

            if let Some(slot) = current
                .iter_mut()
                .find(|item| normalize(&item.name) == key && can_merge(item, ingredient))
            {
                let total = aggregate_quantities(&[
                    (slot.quantity, slot.unit),
                    (ingredient.quantity, ingredient.unit),
                ]);
                if let Some(total) = total {
                    let update = UpdateShoppingListItem {
                        quantity: Some(Some(total.quantity)),
                        unit: Some(Some(total.unit)),
                        ..Default::default()
                    };
                    *slot = self.store.update_item(&slot.id, &update).await?;
                    merged += 1;
                    continue;
                }
            }

            let record = NewShoppingListItem {
                category: classify(&name),
                name,
                quantity: ingredient.quantity,
                unit: ingredient.unit,
                recipe_id: Some(recipe.id.clone()),
                meal_plan_id: None,
                source: ItemSource::Recipe,
                original_name: Some(ingredient.name.clone()),
            };
            let item = self.store.create_item(&record).await?;
            current.push(item.clone());
            created.push(item);
        }

        debug!(
            recipe_id = %recipe.id,
            created = created.len(),
            merged,
            "added recipe to shopping list"
        );
        Ok(created)
    }

    /// Delete every row attributed to `recipe_id`, merged or not.
    pub async fn remove_recipe_ingredients(&self, recipe_id: &str) -> Result<()> {
        self.store.delete_by_recipe_id(recipe_id).await
    }

    pub async fn clear_recipe_items(&self) -> Result<()> {
        self.store.delete_by_source(ItemSource::Recipe).await
    }

    pub async fn clear_all_items(&self) -> Result<()> {
        self.store.clear_all().await
    }
}

fn can_merge(item: &ShoppingListItem, ingredient: &Ingredient) -> bool {
    item.quantity.is_some() && ingredient.quantity.is_some() && are_compatible(item.unit, ingredient.unit)
}

/// Display name for a row: the normalized key, or the trimmed raw name when
/// normalization strips everything.
fn item_name(key: &str, raw: &str) -> Option<String> {
    if !key.is_empty() {
        return Some(key.to_string());
    }
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn creation_record(agg: &AggregatedIngredient) -> Option<NewShoppingListItem> {
    let first_name = agg.original_names.first().map_or("", String::as_str);
    let Some(name) = item_name(&agg.normalized_name, first_name) else {
        warn!(recipes = ?agg.recipe_ids, "skipping aggregated ingredient with a blank name");
        return None;
    };
    Some(NewShoppingListItem {
        name,
        quantity: agg.quantity,
        unit: agg.unit,
        recipe_id: agg.recipe_ids.first().cloned(),
        meal_plan_id: None,
        category: agg.category,
        source: ItemSource::Recipe,
        original_name: agg.original_names.first().cloned(),
    })
}
