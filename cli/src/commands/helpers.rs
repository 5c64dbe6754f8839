use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use basket_core::models::{MeasurementUnit, ShoppingListItem};
use basket_core::recipe_import::parse_quantity;
use basket_core::units::format_quantity;

/// Parse an amount such as "2", "1 1/2 cups", "500g" or "2 tbsp" into a
/// quantity and an optional unit.
pub(crate) fn parse_amount(s: &str) -> Result<(f64, Option<MeasurementUnit>)> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Quantity must not be empty");
    }

    // Plain number or fraction: "2", "1/2", "1 1/2"
    if let Ok(q) = parse_quantity(s) {
        return Ok((q, None));
    }

    // "N<unit>" with no space (e.g. "500g", "2tbsp")
    if let Some((qty, unit)) = split_number_unit(s) {
        return Ok((qty, Some(parse_unit(unit, s)?)));
    }

    // "<number> <unit>": the number may be "1 1/2" and the unit "fl oz",
    // so try each whitespace split point from the left
    let mut unit_error = None;
    for (idx, _) in s.match_indices(char::is_whitespace) {
        let (num_part, unit_part) = s.split_at(idx);
        let Ok(qty) = parse_quantity(num_part) else {
            continue;
        };
        match parse_unit(unit_part.trim(), s) {
            Ok(unit) => return Ok((qty, Some(unit))),
            Err(e) => {
                unit_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = unit_error {
        return Err(e);
    }

    bail!("Invalid quantity format: '{s}'. Use '2', '1 1/2 cups', '500g', etc.")
}

fn parse_unit(unit: &str, whole: &str) -> Result<MeasurementUnit> {
    unit.parse::<MeasurementUnit>()
        .with_context(|| format!("Unknown unit '{unit}' in '{whole}'"))
}

/// Split "500ml" or "2.5tbsp" into (500.0, "ml") or (2.5, "tbsp").
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    if num_part.ends_with(char::is_whitespace) {
        return None;
    }
    let qty = parse_quantity(num_part).ok()?;
    Some((qty, unit_part))
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Find the single item whose id starts with `prefix`.
pub(crate) fn resolve_item<'a>(
    items: &'a [ShoppingListItem],
    prefix: &str,
) -> Result<&'a ShoppingListItem> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        bail!("Item id must not be empty");
    }
    if let Some(exact) = items.iter().find(|i| i.id == prefix) {
        return Ok(exact);
    }
    let mut matches = items.iter().filter(|i| i.id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        (Some(_), Some(_)) => bail!("Item id '{prefix}' is ambiguous; use more characters"),
        (None, _) => bail!("Shopping list item not found"),
    }
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(crate) fn print_items_table(items: &[ShoppingListItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = " ")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Category")]
        category: &'static str,
        #[tabled(rename = "Source")]
        source: &'static str,
    }

    let mut sorted: Vec<&ShoppingListItem> = items.iter().collect();
    sorted.sort_by_key(|item| item.category);

    let rows: Vec<ItemRow> = sorted
        .iter()
        .map(|i| ItemRow {
            id: short_id(&i.id).to_string(),
            checked: if i.checked { "x" } else { "" },
            name: truncate(&i.name, 35),
            amount: format_quantity(i.quantity, i.unit),
            category: i.category.as_str(),
            source: i.source.as_str(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
