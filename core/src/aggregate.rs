use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::category::classify;
use crate::models::{Ingredient, MeasurementUnit, Recipe, ShoppingListCategory, UnitFamily};
use crate::normalize::normalize;
use crate::units::{aggregate_quantities, unit_type};

/// One recipe ingredient tagged with the recipe it came from.
#[derive(Debug, Clone)]
pub struct IngredientEntry {
    pub ingredient: Ingredient,
    pub recipe_id: String,
}

impl IngredientEntry {
    /// Flatten recipes into tagged entries, preserving recipe and ingredient order.
    #[must_use]
    pub fn from_recipes(recipes: &[Recipe]) -> Vec<IngredientEntry> {
        recipes
            .iter()
            .flat_map(|recipe| {
                recipe.ingredients.iter().map(|ingredient| IngredientEntry {
                    ingredient: ingredient.clone(),
                    recipe_id: recipe.id.clone(),
                })
            })
            .collect()
    }

    fn has_quantity(&self) -> bool {
        self.ingredient.quantity.is_some_and(|q| q > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedIngredient {
    pub normalized_name: String,
    /// Distinct raw names, first-seen order.
    pub original_names: Vec<String>,
    pub quantity: Option<f64>,
    pub unit: Option<MeasurementUnit>,
    /// Distinct contributing recipe ids, first-seen order.
    pub recipe_ids: Vec<String>,
    pub category: ShoppingListCategory,
}

impl AggregatedIngredient {
    fn empty(name: &str, category: ShoppingListCategory) -> Self {
        Self {
            normalized_name: name.to_string(),
            original_names: Vec::new(),
            quantity: None,
            unit: None,
            recipe_ids: Vec::new(),
            category,
        }
    }

    fn absorb(&mut self, entry: &IngredientEntry) {
        push_unique(&mut self.original_names, &entry.ingredient.name);
        push_unique(&mut self.recipe_ids, &entry.recipe_id);
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Combine same-ingredient entries across recipes.
///
/// Entries are grouped by normalized name, split by unit family and summed.
/// Incompatible families never merge; they become separate rows sharing the
/// group's category.
#[must_use]
pub fn aggregate(entries: &[IngredientEntry]) -> Vec<AggregatedIngredient> {
    let mut groups: Vec<(String, Vec<&IngredientEntry>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = normalize(&entry.ingredient.name);
        if let Some(&i) = index.get(&key) {
            groups[i].1.push(entry);
        } else {
            index.insert(key.clone(), groups.len());
            groups.push((key, vec![entry]));
        }
    }

    let mut out = Vec::new();
    for (name, group) in &groups {
        aggregate_group(name, group, &mut out);
    }
    out
}

fn aggregate_group(name: &str, group: &[&IngredientEntry], out: &mut Vec<AggregatedIngredient>) {
    let category = classify(name);
    let (measured, unmeasured): (Vec<&IngredientEntry>, Vec<&IngredientEntry>) =
        group.iter().copied().partition(|e| e.has_quantity());

    if measured.is_empty() {
        let mut agg = AggregatedIngredient::empty(name, category);
        agg.unit = group.first().and_then(|e| e.ingredient.unit);
        for entry in group {
            agg.absorb(entry);
        }
        out.push(agg);
        return;
    }

    let mut clusters: Vec<(UnitFamily, Vec<&IngredientEntry>)> = Vec::new();
    for entry in measured {
        let family = unit_type(entry.ingredient.unit);
        match clusters.iter_mut().find(|(f, _)| *f == family) {
            Some((_, members)) => members.push(entry),
            None => clusters.push((family, vec![entry])),
        }
    }

    let first_row = out.len();
    for (family, members) in &clusters {
        let amounts: Vec<(Option<f64>, Option<MeasurementUnit>)> = members
            .iter()
            .map(|e| (e.ingredient.quantity, e.ingredient.unit))
            .collect();

        if let Some(total) = aggregate_quantities(&amounts) {
            let mut agg = AggregatedIngredient::empty(name, category);
            agg.quantity = Some(total.quantity);
            agg.unit = Some(total.unit);
            for entry in members {
                agg.absorb(entry);
            }
            out.push(agg);
        } else {
            warn!(
                ingredient = name,
                family = ?family,
                entries = members.len(),
                "could not merge compatible quantities, keeping entries separate"
            );
            for entry in members {
                let mut agg = AggregatedIngredient::empty(name, category);
                agg.quantity = entry.ingredient.quantity;
                agg.unit = entry.ingredient.unit;
                agg.absorb(entry);
                out.push(agg);
            }
        }
    }

    // "To taste" entries ride along on the first row so their recipes stay attributed
    if let Some(first) = out.get_mut(first_row) {
        for entry in unmeasured {
            first.absorb(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MeasurementUnit::{Cup, Ounce, Piece, Pound, Tablespoon, Teaspoon, Unit};

    fn entry(name: &str, quantity: Option<f64>, unit: Option<MeasurementUnit>, recipe: &str) -> IngredientEntry {
        IngredientEntry {
            ingredient: Ingredient::new(name, quantity, unit),
            recipe_id: recipe.to_string(),
        }
    }

    #[test]
    fn test_same_ingredient_two_recipes() {
        let rows = aggregate(&[
            entry("Milk", Some(1.0), Some(Cup), "a"),
            entry("milk", Some(1.0), Some(Cup), "b"),
        ]);
        assert_eq!(rows.len(), 1);
        let milk = &rows[0];
        assert_eq!(milk.normalized_name, "milk");
        assert_eq!(milk.quantity, Some(2.0));
        assert_eq!(milk.unit, Some(Cup));
        assert_eq!(milk.category, ShoppingListCategory::Dairy);
        assert_eq!(milk.recipe_ids, vec!["a", "b"]);
        assert_eq!(milk.original_names, vec!["Milk", "milk"]);
    }

    #[test]
    fn test_descriptor_variants_merge() {
        let rows = aggregate(&[
            entry("Fresh Tomatoes", Some(2.0), None, "a"),
            entry("tomato", Some(1.0), Some(Piece), "b"),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].normalized_name, "tomato");
        assert_eq!(rows[0].quantity, Some(3.0));
        assert_eq!(rows[0].unit, Some(Unit));
        assert_eq!(rows[0].category, ShoppingListCategory::Produce);
    }

    #[test]
    fn test_volume_units_cluster_together() {
        let rows = aggregate(&[
            entry("sugar", Some(8.0), Some(Tablespoon), "a"),
            entry("sugar", Some(24.0), Some(Teaspoon), "b"),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, Some(1.0));
        assert_eq!(rows[0].unit, Some(Cup));
    }

    #[test]
    fn test_cross_family_never_merges() {
        let rows = aggregate(&[
            entry("chicken", Some(1.0), Some(Pound), "a"),
            entry("chicken", Some(2.0), Some(Piece), "b"),
        ]);
        assert!(rows.len() >= 2);
        assert!(rows.iter().all(|r| r.category == ShoppingListCategory::MeatSeafood));
        let mut ids: Vec<&str> = rows
            .iter()
            .flat_map(|r| r.recipe_ids.iter().map(String::as_str))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_all_quantity_less_yields_one_null_row() {
        let rows = aggregate(&[
            entry("salt", None, None, "a"),
            entry("Salt", None, Some(Teaspoon), "b"),
            entry("salt", Some(0.0), None, "c"),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, None);
        assert_eq!(rows[0].unit, None);
        assert_eq!(rows[0].recipe_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unmeasured_entries_keep_attribution() {
        let rows = aggregate(&[
            entry("butter", Some(4.0), Some(Ounce), "a"),
            entry("butter", None, None, "b"),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, Some(4.0));
        assert_eq!(rows[0].unit, Some(Ounce));
        assert_eq!(rows[0].recipe_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_first_seen_order() {
        let rows = aggregate(&[
            entry("onion", Some(1.0), None, "a"),
            entry("garlic", Some(2.0), None, "a"),
            entry("onion", Some(1.0), None, "b"),
        ]);
        let names: Vec<&str> = rows.iter().map(|r| r.normalized_name.as_str()).collect();
        assert_eq!(names, vec!["onion", "garlic"]);
    }

    #[test]
    fn test_from_recipes_tags_entries() {
        let recipes = vec![
            Recipe {
                id: "r1".to_string(),
                name: "Pancakes".to_string(),
                ingredients: vec![
                    Ingredient::new("flour", Some(2.0), Some(Cup)),
                    Ingredient::new("eggs", Some(2.0), None),
                ],
                created_at: String::new(),
            },
            Recipe {
                id: "r2".to_string(),
                name: "Omelette".to_string(),
                ingredients: vec![Ingredient::new("Large Eggs", Some(3.0), None)],
                created_at: String::new(),
            },
        ];
        let entries = IngredientEntry::from_recipes(&recipes);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].recipe_id, "r2");

        let rows = aggregate(&entries);
        let eggs = rows.iter().find(|r| r.normalized_name == "egg").unwrap();
        assert_eq!(eggs.quantity, Some(5.0));
        assert_eq!(eggs.recipe_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
