use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::{
    DateWindow, Ingredient, ItemSource, MealPlanEntry, NewMealPlanEntry, NewShoppingListItem,
    Recipe, RecipeSummary, ShoppingListItem, UpdateShoppingListItem, validate_item_name,
    validate_meal_type, validate_quantity,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const ITEM_COLUMNS: &str = "id, name, quantity, unit, checked, recipe_id, meal_plan_id, category, source, original_name, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    quantity REAL,
                    unit TEXT
                );

                CREATE TABLE IF NOT EXISTS meal_plan_entries (
                    id TEXT PRIMARY KEY,
                    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_name ON recipes(name);
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_meal_plan_date ON meal_plan_entries(date);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    quantity REAL,
                    unit TEXT,
                    checked INTEGER NOT NULL DEFAULT 0,
                    recipe_id TEXT,
                    meal_plan_id TEXT,
                    category TEXT NOT NULL,
                    source TEXT NOT NULL CHECK (source IN ('recipe', 'manual')),
                    original_name TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_shopping_items_source ON shopping_list_items(source);
                CREATE INDEX IF NOT EXISTS idx_shopping_items_recipe ON shopping_list_items(recipe_id);

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            name: row.get(0)?,
            quantity: row.get(1)?,
            unit: parse_optional_text(row, 2)?,
        })
    }

    // Expects columns:
    // 0: mp.id, 1: mp.recipe_id, 2: mp.date, 3: mp.meal_type, 4: mp.created_at, 5: r.name
    fn meal_plan_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealPlanEntry> {
        let date: String = row.get(2)?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(MealPlanEntry {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            date,
            meal_type: row.get(3)?,
            created_at: row.get(4)?,
            recipe_name: row.get(5)?,
        })
    }

    fn shopping_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
        Ok(ShoppingListItem {
            id: row.get(0)?,
            name: row.get(1)?,
            quantity: row.get(2)?,
            unit: parse_optional_text(row, 3)?,
            checked: row.get(4)?,
            recipe_id: row.get(5)?,
            meal_plan_id: row.get(6)?,
            category: parse_text(row, 7)?,
            source: parse_text(row, 8)?,
            original_name: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    // --- Recipes ---

    pub fn create_recipe(&self, name: &str) -> Result<Recipe> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Recipe name cannot be empty");
        }
        if self.find_recipe_by_name(name)?.is_some() {
            bail!("Recipe '{name}' already exists");
        }

        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO recipes (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, now],
        )?;
        Ok(Recipe {
            id,
            name: name.to_string(),
            ingredients: Vec::new(),
            created_at: now,
        })
    }

    pub fn add_recipe_ingredient(&self, recipe_id: &str, ingredient: &Ingredient) -> Result<Ingredient> {
        let name = ingredient.name.trim();
        if name.is_empty() {
            bail!("Ingredient name cannot be empty");
        }
        validate_quantity(ingredient.quantity)?;
        if !self.recipe_exists(recipe_id)? {
            bail!("Recipe not found");
        }

        let position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, position, name, quantity, unit) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                recipe_id,
                position,
                name,
                ingredient.quantity,
                ingredient.unit.map(|u| u.as_str()),
            ],
        )?;
        Ok(Ingredient::new(name, ingredient.quantity, ingredient.unit))
    }

    pub fn remove_recipe_ingredient(&self, recipe_id: &str, name: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1 AND LOWER(name) = LOWER(?2)",
            params![recipe_id, name.trim()],
        )?;
        Ok(rows > 0)
    }

    fn recipe_exists(&self, recipe_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE id = ?1",
            params![recipe_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM recipes WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let recipe_id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let created_at: String = row.get(2)?;
        let ingredients = self.get_recipe_ingredients(&recipe_id)?;
        Ok(Some(Recipe {
            id: recipe_id,
            name,
            ingredients,
            created_at,
        }))
    }

    pub fn get_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<Ingredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, quantity, unit FROM recipe_ingredients WHERE recipe_id = ?1 ORDER BY position, id",
        )?;
        let ingredients = stmt
            .query_map(params![recipe_id], Self::ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    /// Case-insensitive name lookup.
    pub fn find_recipe_by_name(&self, name: &str) -> Result<Option<Recipe>> {
        let id: Option<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM recipes WHERE LOWER(name) = LOWER(?1) ORDER BY rowid LIMIT 1")?;
            let mut rows = stmt.query(params![name.trim()])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        match id {
            Some(id) => self.get_recipe(&id),
            None => Ok(None),
        }
    }

    pub fn get_recipe_by_name(&self, name: &str) -> Result<Recipe> {
        self.find_recipe_by_name(name)?
            .with_context(|| format!("Recipe '{name}' not found"))
    }

    pub fn list_recipes(&self) -> Result<Vec<RecipeSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name,
                    (SELECT COUNT(*) FROM recipe_ingredients ri WHERE ri.recipe_id = r.id),
                    (SELECT COUNT(*) FROM meal_plan_entries mp WHERE mp.recipe_id = r.id)
             FROM recipes r
             ORDER BY LOWER(r.name)",
        )?;
        let recipes = stmt
            .query_map([], |row| {
                Ok(RecipeSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ingredient_count: row.get(2)?,
                    planned_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn delete_recipe(&self, recipe_id: &str) -> Result<bool> {
        // Foreign keys are off by default in SQLite, so children go first
        self.conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        self.conn.execute(
            "DELETE FROM meal_plan_entries WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![recipe_id])?;
        Ok(rows > 0)
    }

    // --- Meal plan ---

    pub fn add_meal_plan_entry(&self, entry: &NewMealPlanEntry) -> Result<MealPlanEntry> {
        let meal_type = validate_meal_type(&entry.meal_type)?;
        let recipe = self
            .get_recipe(&entry.recipe_id)?
            .context("Recipe not found")?;

        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO meal_plan_entries (id, recipe_id, date, meal_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                entry.recipe_id,
                entry.date.format(DATE_FORMAT).to_string(),
                meal_type,
                now,
            ],
        )?;
        Ok(MealPlanEntry {
            id,
            recipe_id: entry.recipe_id.clone(),
            date: entry.date,
            meal_type,
            created_at: now,
            recipe_name: Some(recipe.name),
        })
    }

    /// Remove a recipe from one date, or from every date when `date` is `None`.
    pub fn remove_meal_plan_entries(&self, recipe_id: &str, date: Option<NaiveDate>) -> Result<usize> {
        let rows = match date {
            Some(date) => self.conn.execute(
                "DELETE FROM meal_plan_entries WHERE recipe_id = ?1 AND date = ?2",
                params![recipe_id, date.format(DATE_FORMAT).to_string()],
            )?,
            None => self.conn.execute(
                "DELETE FROM meal_plan_entries WHERE recipe_id = ?1",
                params![recipe_id],
            )?,
        };
        Ok(rows)
    }

    pub fn get_meal_plan(&self, window: &DateWindow) -> Result<Vec<MealPlanEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT mp.id, mp.recipe_id, mp.date, mp.meal_type, mp.created_at, r.name
             FROM meal_plan_entries mp
             LEFT JOIN recipes r ON mp.recipe_id = r.id
             WHERE mp.date BETWEEN ?1 AND ?2
             ORDER BY mp.date, mp.rowid",
        )?;
        let entries = stmt
            .query_map(
                params![
                    window.start.format(DATE_FORMAT).to_string(),
                    window.end.format(DATE_FORMAT).to_string()
                ],
                Self::meal_plan_entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Distinct planned recipe ids in `window`, ordered by first appearance.
    pub fn queued_recipe_ids(&self, window: &DateWindow) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipe_id FROM meal_plan_entries
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date, rowid",
        )?;
        let all: Vec<String> = stmt
            .query_map(
                params![
                    window.start.format(DATE_FORMAT).to_string(),
                    window.end.format(DATE_FORMAT).to_string()
                ],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids: Vec<String> = Vec::with_capacity(all.len());
        for id in all {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    // --- Shopping list ---

    pub fn insert_shopping_item(&self, input: &NewShoppingListItem) -> Result<ShoppingListItem> {
        insert_item(&self.conn, input)
    }

    /// Inserts every row or none.
    pub fn insert_shopping_items(&self, inputs: &[NewShoppingListItem]) -> Result<Vec<ShoppingListItem>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(insert_item(&tx, input)?);
        }
        tx.commit()?;
        Ok(created)
    }

    pub fn get_shopping_item(&self, id: &str) -> Result<ShoppingListItem> {
        self.conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM shopping_list_items WHERE id = ?1"),
                params![id],
                Self::shopping_item_from_row,
            )
            .context("Shopping list item not found")
    }

    /// Every item, in category display order and then creation order.
    pub fn list_shopping_items(&self) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items ORDER BY rowid"
        ))?;
        let mut items = stmt
            .query_map([], Self::shopping_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        items.sort_by_key(|item| item.category);
        Ok(items)
    }

    pub fn set_shopping_item_checked(&self, id: &str, checked: bool) -> Result<ShoppingListItem> {
        let rows = self.conn.execute(
            "UPDATE shopping_list_items SET checked = ?1 WHERE id = ?2",
            params![checked, id],
        )?;
        if rows == 0 {
            bail!("Shopping list item not found");
        }
        self.get_shopping_item(id)
    }

    pub fn update_shopping_item(
        &self,
        id: &str,
        update: &UpdateShoppingListItem,
    ) -> Result<ShoppingListItem> {
        let mut item = self.get_shopping_item(id)?;

        if let Some(name) = &update.name {
            item.name = validate_item_name(name)?;
        }
        if let Some(quantity) = update.quantity {
            validate_quantity(quantity)?;
            item.quantity = quantity;
        }
        if let Some(unit) = update.unit {
            item.unit = unit;
        }
        if let Some(checked) = update.checked {
            item.checked = checked;
        }
        if let Some(category) = update.category {
            item.category = category;
        }

        self.conn.execute(
            "UPDATE shopping_list_items SET name = ?1, quantity = ?2, unit = ?3, checked = ?4, category = ?5 WHERE id = ?6",
            params![
                item.name,
                item.quantity,
                item.unit.map(|u| u.as_str()),
                item.checked,
                item.category.as_str(),
                id,
            ],
        )?;
        Ok(item)
    }

    pub fn delete_shopping_item(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM shopping_list_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn delete_shopping_items_by_source(&self, source: ItemSource) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE source = ?1",
            params![source.as_str()],
        )?;
        Ok(rows)
    }

    pub fn delete_shopping_items_by_recipe(&self, recipe_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        Ok(rows)
    }

    pub fn delete_shopping_items(&self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut rows = 0;
        for id in ids {
            rows += tx.execute("DELETE FROM shopping_list_items WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(rows)
    }

    pub fn clear_shopping_items(&self) -> Result<usize> {
        let rows = self.conn.execute("DELETE FROM shopping_list_items", [])?;
        Ok(rows)
    }
}

fn insert_item(conn: &Connection, input: &NewShoppingListItem) -> Result<ShoppingListItem> {
    let now = Local::now().to_rfc3339();
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO shopping_list_items (id, name, quantity, unit, checked, recipe_id, meal_plan_id, category, source, original_name, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            input.name,
            input.quantity,
            input.unit.map(|u| u.as_str()),
            input.recipe_id,
            input.meal_plan_id,
            input.category.as_str(),
            input.source.as_str(),
            input.original_name,
            now,
        ],
    )?;
    Ok(ShoppingListItem {
        id,
        name: input.name.clone(),
        quantity: input.quantity,
        unit: input.unit,
        checked: false,
        recipe_id: input.recipe_id.clone(),
        meal_plan_id: input.meal_plan_id.clone(),
        category: input.category,
        source: input.source,
        original_name: input.original_name.clone(),
        created_at: now,
    })
}

fn parse_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_optional_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    })
    .transpose()
}
