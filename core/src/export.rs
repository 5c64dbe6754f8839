use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};

use crate::models::ShoppingListItem;
use crate::ports::group_by_category;
use crate::units::format_quantity;

/// Write `Category,Item,Quantity,Unit,Checked,Source` rows in category display order.
pub fn write_csv<W: Write>(items: &[ShoppingListItem], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Category", "Item", "Quantity", "Unit", "Checked", "Source"])?;

    let mut sorted: Vec<&ShoppingListItem> = items.iter().collect();
    sorted.sort_by_key(|item| item.category);
    for item in sorted {
        let quantity = format_quantity(item.quantity, None);
        wtr.write_record([
            item.category.as_str(),
            item.name.as_str(),
            quantity.as_str(),
            item.unit.map_or("", |u| u.as_str()),
            if item.checked { "yes" } else { "no" },
            item.source.as_str(),
        ])?;
    }
    wtr.flush().context("Failed to write CSV")?;
    Ok(())
}

/// Plain-text list grouped under category headings.
#[must_use]
pub fn render_text(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    for (category, group) in group_by_category(items.to_vec()) {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{category}");
        for item in group {
            let mark = if item.checked { "x" } else { " " };
            let amount = format_quantity(item.quantity, item.unit);
            if amount.is_empty() {
                let _ = writeln!(out, "[{mark}] {}", item.name);
            } else {
                let _ = writeln!(out, "[{mark}] {} {amount}", item.name);
            }
        }
    }
    out
}
