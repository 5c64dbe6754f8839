use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length (in characters) of a manually added item name.
pub const MAX_ITEM_NAME_LEN: usize = 100;

// --- Units ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementUnit {
    #[serde(rename = "tsp")]
    Teaspoon,
    #[serde(rename = "tbsp")]
    Tablespoon,
    #[serde(rename = "cup")]
    Cup,
    #[serde(rename = "fl-oz")]
    FluidOunce,
    #[serde(rename = "ml")]
    Milliliter,
    #[serde(rename = "liter")]
    Liter,
    #[serde(rename = "oz")]
    Ounce,
    #[serde(rename = "lb")]
    Pound,
    #[serde(rename = "gram")]
    Gram,
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "unit")]
    Unit,
    #[serde(rename = "piece")]
    Piece,
    #[serde(rename = "slice")]
    Slice,
    #[serde(rename = "clove")]
    Clove,
    #[serde(rename = "head")]
    Head,
    #[serde(rename = "bunch")]
    Bunch,
    #[serde(rename = "can")]
    Can,
    #[serde(rename = "bottle")]
    Bottle,
    #[serde(rename = "package")]
    Package,
    #[serde(rename = "bag")]
    Bag,
    #[serde(rename = "box")]
    Box,
}

impl MeasurementUnit {
    pub const ALL: [MeasurementUnit; 21] = [
        MeasurementUnit::Teaspoon,
        MeasurementUnit::Tablespoon,
        MeasurementUnit::Cup,
        MeasurementUnit::FluidOunce,
        MeasurementUnit::Milliliter,
        MeasurementUnit::Liter,
        MeasurementUnit::Ounce,
        MeasurementUnit::Pound,
        MeasurementUnit::Gram,
        MeasurementUnit::Kilogram,
        MeasurementUnit::Unit,
        MeasurementUnit::Piece,
        MeasurementUnit::Slice,
        MeasurementUnit::Clove,
        MeasurementUnit::Head,
        MeasurementUnit::Bunch,
        MeasurementUnit::Can,
        MeasurementUnit::Bottle,
        MeasurementUnit::Package,
        MeasurementUnit::Bag,
        MeasurementUnit::Box,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementUnit::Teaspoon => "tsp",
            MeasurementUnit::Tablespoon => "tbsp",
            MeasurementUnit::Cup => "cup",
            MeasurementUnit::FluidOunce => "fl-oz",
            MeasurementUnit::Milliliter => "ml",
            MeasurementUnit::Liter => "liter",
            MeasurementUnit::Ounce => "oz",
            MeasurementUnit::Pound => "lb",
            MeasurementUnit::Gram => "gram",
            MeasurementUnit::Kilogram => "kg",
            MeasurementUnit::Unit => "unit",
            MeasurementUnit::Piece => "piece",
            MeasurementUnit::Slice => "slice",
            MeasurementUnit::Clove => "clove",
            MeasurementUnit::Head => "head",
            MeasurementUnit::Bunch => "bunch",
            MeasurementUnit::Can => "can",
            MeasurementUnit::Bottle => "bottle",
            MeasurementUnit::Package => "package",
            MeasurementUnit::Bag => "bag",
            MeasurementUnit::Box => "box",
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('.');
        // "T" (tablespoon) vs "t" (teaspoon) is the one case-sensitive spelling
        match trimmed {
            "T" | "Tbs" | "TBS" => return Ok(MeasurementUnit::Tablespoon),
            "t" => return Ok(MeasurementUnit::Teaspoon),
            _ => {}
        }
        let lower = trimmed.to_lowercase();
        let unit = match lower.as_str() {
            "tsp" | "tsps" | "teaspoon" | "teaspoons" => MeasurementUnit::Teaspoon,
            "tbsp" | "tbsps" | "tbs" | "tablespoon" | "tablespoons" => MeasurementUnit::Tablespoon,
            "cup" | "cups" | "c" => MeasurementUnit::Cup,
            "fl-oz" | "fl oz" | "floz" | "fl. oz" | "fluid ounce" | "fluid ounces" => {
                MeasurementUnit::FluidOunce
            }
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                MeasurementUnit::Milliliter
            }
            "l" | "liter" | "liters" | "litre" | "litres" => MeasurementUnit::Liter,
            "oz" | "ounce" | "ounces" => MeasurementUnit::Ounce,
            "lb" | "lbs" | "pound" | "pounds" => MeasurementUnit::Pound,
            "g" | "gram" | "grams" | "gr" => MeasurementUnit::Gram,
            "kg" | "kgs" | "kilogram" | "kilograms" => MeasurementUnit::Kilogram,
            "unit" | "units" | "whole" | "item" | "items" => MeasurementUnit::Unit,
            "piece" | "pieces" | "pc" | "pcs" => MeasurementUnit::Piece,
            "slice" | "slices" => MeasurementUnit::Slice,
            "clove" | "cloves" => MeasurementUnit::Clove,
            "head" | "heads" => MeasurementUnit::Head,
            "bunch" | "bunches" => MeasurementUnit::Bunch,
            "can" | "cans" | "tin" | "tins" => MeasurementUnit::Can,
            "bottle" | "bottles" => MeasurementUnit::Bottle,
            "package" | "packages" | "pkg" | "packet" | "packets" => MeasurementUnit::Package,
            "bag" | "bags" => MeasurementUnit::Bag,
            "box" | "boxes" => MeasurementUnit::Box,
            _ => bail!("Unknown unit '{s}'"),
        };
        Ok(unit)
    }
}

/// Unit family. Conversion and merging only happen within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFamily {
    Volume,
    Weight,
    Count,
}

// --- Categories ---

/// Store-aisle category. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShoppingListCategory {
    Produce,
    Dairy,
    #[serde(rename = "Meat & Seafood")]
    MeatSeafood,
    Pantry,
    Frozen,
    Bakery,
    Other,
}

impl ShoppingListCategory {
    pub const ALL: [ShoppingListCategory; 7] = [
        ShoppingListCategory::Produce,
        ShoppingListCategory::Dairy,
        ShoppingListCategory::MeatSeafood,
        ShoppingListCategory::Pantry,
        ShoppingListCategory::Frozen,
        ShoppingListCategory::Bakery,
        ShoppingListCategory::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShoppingListCategory::Produce => "Produce",
            ShoppingListCategory::Dairy => "Dairy",
            ShoppingListCategory::MeatSeafood => "Meat & Seafood",
            ShoppingListCategory::Pantry => "Pantry",
            ShoppingListCategory::Frozen => "Frozen",
            ShoppingListCategory::Bakery => "Bakery",
            ShoppingListCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ShoppingListCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShoppingListCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let category = match lower.as_str() {
            "produce" => ShoppingListCategory::Produce,
            "dairy" => ShoppingListCategory::Dairy,
            "meat & seafood" | "meat and seafood" | "meat" | "seafood" => {
                ShoppingListCategory::MeatSeafood
            }
            "pantry" => ShoppingListCategory::Pantry,
            "frozen" => ShoppingListCategory::Frozen,
            "bakery" => ShoppingListCategory::Bakery,
            "other" => ShoppingListCategory::Other,
            _ => bail!(
                "Invalid category '{s}'. Must be one of: {}",
                ShoppingListCategory::ALL.map(ShoppingListCategory::as_str).join(", ")
            ),
        };
        Ok(category)
    }
}

// --- Recipes ---

/// An ingredient as authored on a recipe. `quantity: None` means "to taste".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<MeasurementUnit>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: Option<f64>, unit: Option<MeasurementUnit>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: String,
    pub name: String,
    pub ingredient_count: i64,
    pub planned_count: i64,
}

// --- Meal plan ---

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

#[derive(Debug, Clone, Serialize)]
pub struct MealPlanEntry {
    pub id: String,
    pub recipe_id: String,
    pub date: NaiveDate,
    pub meal_type: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMealPlanEntry {
    pub recipe_id: String,
    pub date: NaiveDate,
    pub meal_type: String,
}

/// Inclusive date range used to select queued recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `days` days beginning at `start` (a zero-day window still covers `start`).
    #[must_use]
    pub fn starting(start: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start,
            end: start + chrono::Duration::days(span),
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// --- Shopping list ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Recipe,
    Manual,
}

impl ItemSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemSource::Recipe => "recipe",
            ItemSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "recipe" => Ok(ItemSource::Recipe),
            "manual" => Ok(ItemSource::Manual),
            _ => bail!("Invalid item source '{s}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub id: String,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<MeasurementUnit>,
    pub checked: bool,
    pub recipe_id: Option<String>,
    pub meal_plan_id: Option<String>,
    pub category: ShoppingListCategory,
    pub source: ItemSource,
    pub original_name: Option<String>,
    pub created_at: String,
}

/// Creation record handed to the persistence port.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShoppingListItem {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<MeasurementUnit>,
    pub recipe_id: Option<String>,
    pub meal_plan_id: Option<String>,
    pub category: ShoppingListCategory,
    pub source: ItemSource,
    pub original_name: Option<String>,
}

/// Partial update. Outer `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateShoppingListItem {
    pub name: Option<String>,
    pub quantity: Option<Option<f64>>,
    pub unit: Option<Option<MeasurementUnit>>,
    pub checked: Option<bool>,
    pub category: Option<ShoppingListCategory>,
}

/// User input for a manually added item.
#[derive(Debug, Clone, Default)]
pub struct NewManualItem {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<MeasurementUnit>,
    pub category: Option<ShoppingListCategory>,
}

// --- Validation ---

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.trim().to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

/// Validate a manual item name, returning it trimmed.
pub fn validate_item_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_ITEM_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            max: MAX_ITEM_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

pub fn validate_quantity(quantity: Option<f64>) -> Result<(), ValidationError> {
    match quantity {
        Some(q) if !q.is_finite() || q < 0.0 => Err(ValidationError::InvalidQuantity),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse_aliases() {
        let cases = [
            ("tablespoons", MeasurementUnit::Tablespoon),
            ("T", MeasurementUnit::Tablespoon),
            ("t", MeasurementUnit::Teaspoon),
            ("TSP", MeasurementUnit::Teaspoon),
            ("Cups", MeasurementUnit::Cup),
            ("fl oz", MeasurementUnit::FluidOunce),
            ("g", MeasurementUnit::Gram),
            ("lbs", MeasurementUnit::Pound),
            ("cloves", MeasurementUnit::Clove),
            ("L", MeasurementUnit::Liter),
            ("pkg.", MeasurementUnit::Package),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<MeasurementUnit>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_unit_parse_unknown() {
        assert!("handful".parse::<MeasurementUnit>().is_err());
        assert!("".parse::<MeasurementUnit>().is_err());
    }

    #[test]
    fn test_unit_canonical_names_parse_back() {
        for unit in MeasurementUnit::ALL {
            assert_eq!(unit.as_str().parse::<MeasurementUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_category_order_matches_display_order() {
        let mut sorted = ShoppingListCategory::ALL;
        sorted.sort();
        assert_eq!(sorted, ShoppingListCategory::ALL);
        assert_eq!(ShoppingListCategory::ALL[2].as_str(), "Meat & Seafood");
        assert_eq!(ShoppingListCategory::ALL[6], ShoppingListCategory::Other);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "meat".parse::<ShoppingListCategory>().unwrap(),
            ShoppingListCategory::MeatSeafood
        );
        assert_eq!(
            "Meat & Seafood".parse::<ShoppingListCategory>().unwrap(),
            ShoppingListCategory::MeatSeafood
        );
        assert_eq!(
            " DAIRY ".parse::<ShoppingListCategory>().unwrap(),
            ShoppingListCategory::Dairy
        );
        assert!("snacks".parse::<ShoppingListCategory>().is_err());
    }

    #[test]
    fn test_validate_meal_type() {
        assert_eq!(validate_meal_type("Dinner").unwrap(), "dinner");
        assert!(validate_meal_type("brunch").is_err());
    }

    #[test]
    fn test_validate_item_name() {
        assert_eq!(validate_item_name("  batteries ").unwrap(), "batteries");
        assert_eq!(validate_item_name("   "), Err(ValidationError::EmptyName));
        let long = "x".repeat(MAX_ITEM_NAME_LEN + 1);
        assert_eq!(
            validate_item_name(&long),
            Err(ValidationError::NameTooLong {
                max: MAX_ITEM_NAME_LEN
            })
        );
        let exact = "x".repeat(MAX_ITEM_NAME_LEN);
        assert!(validate_item_name(&exact).is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(None).is_ok());
        assert!(validate_quantity(Some(2.0)).is_ok());
        assert!(validate_quantity(Some(-1.0)).is_err());
        assert!(validate_quantity(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_date_window_starting() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let window = DateWindow::starting(start, 7);
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
        assert!(window.contains(start));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()));

        let single = DateWindow::starting(start, 0);
        assert_eq!(single.start, single.end);
    }

    #[test]
    fn test_item_source_serde_names() {
        assert_eq!("recipe".parse::<ItemSource>().unwrap(), ItemSource::Recipe);
        assert_eq!(ItemSource::Manual.to_string(), "manual");
        assert!("Manual".parse::<ItemSource>().is_err());
    }
}
