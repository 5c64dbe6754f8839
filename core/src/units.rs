use serde::Serialize;

use crate::models::{MeasurementUnit, UnitFamily};

// Volume converts through teaspoons, weight through ounces
const TSP_PER_TBSP: f64 = 3.0;
const TSP_PER_CUP: f64 = 48.0;
const TSP_PER_FL_OZ: f64 = 6.0;
const TSP_PER_ML: f64 = 0.202_884;
const TSP_PER_LITER: f64 = 202.884;

const OZ_PER_LB: f64 = 16.0;
const OZ_PER_GRAM: f64 = 0.035_274;
const OZ_PER_KG: f64 = 35.274;

/// A quantity expressed in its family's base unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseQuantity {
    pub value: f64,
    pub family: UnitFamily,
}

/// A quantity paired with the unit it should be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quantity {
    pub quantity: f64,
    pub unit: MeasurementUnit,
}

#[must_use]
pub fn unit_type(unit: Option<MeasurementUnit>) -> UnitFamily {
    use MeasurementUnit::{
        Cup, FluidOunce, Gram, Kilogram, Liter, Milliliter, Ounce, Pound, Tablespoon, Teaspoon,
    };
    match unit {
        Some(Teaspoon | Tablespoon | Cup | FluidOunce | Milliliter | Liter) => UnitFamily::Volume,
        Some(Ounce | Pound | Gram | Kilogram) => UnitFamily::Weight,
        _ => UnitFamily::Count,
    }
}

#[must_use]
pub fn are_compatible(a: Option<MeasurementUnit>, b: Option<MeasurementUnit>) -> bool {
    unit_type(a) == unit_type(b)
}

fn base_factor(unit: Option<MeasurementUnit>) -> f64 {
    match unit {
        Some(MeasurementUnit::Teaspoon | MeasurementUnit::Ounce) => 1.0,
        Some(MeasurementUnit::Tablespoon) => TSP_PER_TBSP,
        Some(MeasurementUnit::Cup) => TSP_PER_CUP,
        Some(MeasurementUnit::FluidOunce) => TSP_PER_FL_OZ,
        Some(MeasurementUnit::Milliliter) => TSP_PER_ML,
        Some(MeasurementUnit::Liter) => TSP_PER_LITER,
        Some(MeasurementUnit::Pound) => OZ_PER_LB,
        Some(MeasurementUnit::Gram) => OZ_PER_GRAM,
        Some(MeasurementUnit::Kilogram) => OZ_PER_KG,
        _ => 1.0,
    }
}

#[must_use]
pub fn to_base(quantity: f64, unit: Option<MeasurementUnit>) -> BaseQuantity {
    BaseQuantity {
        value: quantity * base_factor(unit),
        family: unit_type(unit),
    }
}

/// Render a base amount in the most natural unit of its family.
#[must_use]
pub fn to_display(base_value: f64, family: UnitFamily) -> Quantity {
    let (value, unit) = match family {
        UnitFamily::Volume if base_value >= TSP_PER_CUP => {
            (base_value / TSP_PER_CUP, MeasurementUnit::Cup)
        }
        UnitFamily::Volume if base_value >= TSP_PER_TBSP => {
            (base_value / TSP_PER_TBSP, MeasurementUnit::Tablespoon)
        }
        UnitFamily::Volume => (base_value, MeasurementUnit::Teaspoon),
        UnitFamily::Weight if base_value >= OZ_PER_LB => {
            (base_value / OZ_PER_LB, MeasurementUnit::Pound)
        }
        UnitFamily::Weight => (base_value, MeasurementUnit::Ounce),
        UnitFamily::Count => (base_value, MeasurementUnit::Unit),
    };
    Quantity {
        quantity: round2(value),
        unit,
    }
}

/// Convert between two units of the same family. `None` when the source unit
/// is missing or the families differ.
#[must_use]
pub fn convert(
    quantity: f64,
    from: Option<MeasurementUnit>,
    to: Option<MeasurementUnit>,
) -> Option<f64> {
    if from.is_none() || !are_compatible(from, to) {
        return None;
    }
    if unit_type(from) == UnitFamily::Count {
        return Some(quantity);
    }
    let base = to_base(quantity, from);
    Some(round2(base.value / base_factor(to)))
}

/// Human-readable quantity: `"2 cup"`, `"1.5"`, `"(tbsp)"` or `""`.
#[must_use]
pub fn format_quantity(quantity: Option<f64>, unit: Option<MeasurementUnit>) -> String {
    match (quantity, unit) {
        (None, Some(u)) => format!("({u})"),
        (None, None) => String::new(),
        (Some(q), Some(u)) => format!("{} {u}", format_number(q)),
        (Some(q), None) => format_number(q),
    }
}

/// Sum a list of quantities into one display quantity.
///
/// Null and non-positive entries are ignored. Returns `None` when nothing is
/// left or when the remaining entries span more than one unit family.
#[must_use]
pub fn aggregate_quantities(entries: &[(Option<f64>, Option<MeasurementUnit>)]) -> Option<Quantity> {
    let mut family = None;
    let mut total = 0.0;
    for &(quantity, unit) in entries {
        let Some(q) = quantity.filter(|q| *q > 0.0) else {
            continue;
        };
        let base = to_base(q, unit);
        match family {
            None => family = Some(base.family),
            Some(f) if f != base.family => return None,
            Some(_) => {}
        }
        total += base.value;
    }
    family.map(|f| to_display(total, f))
}

/// Round to two decimals, nearest (never truncating).
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shortest text that reads back as `value`: "2", "0.125", "1.5".
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
