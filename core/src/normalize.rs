use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// Compound terms whose descriptor word carries meaning. A name containing
/// one of these skips descriptor stripping entirely.
const KEEP_TERMS: &[&str] = &[
    "olive oil",
    "vegetable oil",
    "coconut oil",
    "sesame oil",
    "canola oil",
    "baking powder",
    "baking soda",
    "chicken broth",
    "beef broth",
    "vegetable broth",
    "chicken stock",
    "beef stock",
    "vegetable stock",
    "green onion",
    "red onion",
    "white onion",
    "yellow onion",
    "sweet potato",
    "bell pepper",
    "red pepper flakes",
    "black pepper",
    "brown sugar",
    "powdered sugar",
    "sour cream",
    "heavy cream",
    "cream cheese",
    "ice cream",
    "whole wheat",
    "all-purpose flour",
    "hot sauce",
    "soy sauce",
    "green bean",
    "ground beef",
    "ground turkey",
    "ground pork",
    "cold brew",
];

/// Cosmetic descriptors (freshness, prep state, size, temperature).
const DESCRIPTORS: &[&str] = &[
    "fresh",
    "freshly",
    "chopped",
    "finely chopped",
    "roughly chopped",
    "coarsely chopped",
    "diced",
    "finely diced",
    "minced",
    "sliced",
    "thinly sliced",
    "grated",
    "freshly grated",
    "shredded",
    "crushed",
    "peeled",
    "seeded",
    "cubed",
    "trimmed",
    "halved",
    "quartered",
    "julienned",
    "mashed",
    "softened",
    "melted",
    "sifted",
    "drained",
    "rinsed",
    "rinsed and drained",
    "cooked",
    "uncooked",
    "raw",
    "ripe",
    "organic",
    "large",
    "extra large",
    "extra-large",
    "medium",
    "small",
    "jumbo",
    "baby",
    "boneless",
    "skinless",
    "boneless skinless",
    "cold",
    "warm",
    "hot",
    "room temperature",
    "at room temperature",
    "lukewarm",
    "to taste",
    "optional",
    "for garnish",
];

/// Exact-match singularization table. No suffix heuristics.
const PLURALS: &[(&str, &str)] = &[
    ("tomatoes", "tomato"),
    ("potatoes", "potato"),
    ("sweet potatoes", "sweet potato"),
    ("onions", "onion"),
    ("green onions", "green onion"),
    ("scallions", "scallion"),
    ("shallots", "shallot"),
    ("leeks", "leek"),
    ("carrots", "carrot"),
    ("cucumbers", "cucumber"),
    ("zucchinis", "zucchini"),
    ("radishes", "radish"),
    ("mushrooms", "mushroom"),
    ("peppers", "pepper"),
    ("bell peppers", "bell pepper"),
    ("jalapenos", "jalapeno"),
    ("chilies", "chili"),
    ("chiles", "chile"),
    ("avocados", "avocado"),
    ("olives", "olive"),
    ("beans", "bean"),
    ("green beans", "green bean"),
    ("lentils", "lentil"),
    ("leaves", "leaf"),
    ("bay leaves", "bay leaf"),
    ("halves", "half"),
    ("loaves", "loaf"),
    ("cloves", "clove"),
    ("eggs", "egg"),
    ("apples", "apple"),
    ("bananas", "banana"),
    ("lemons", "lemon"),
    ("limes", "lime"),
    ("oranges", "orange"),
    ("peaches", "peach"),
    ("pears", "pear"),
    ("plums", "plum"),
    ("apricots", "apricot"),
    ("grapes", "grape"),
    ("figs", "fig"),
    ("dates", "date"),
    ("cherries", "cherry"),
    ("berries", "berry"),
    ("strawberries", "strawberry"),
    ("blueberries", "blueberry"),
    ("raspberries", "raspberry"),
    ("blackberries", "blackberry"),
    ("cranberries", "cranberry"),
    ("raisins", "raisin"),
    ("almonds", "almond"),
    ("walnuts", "walnut"),
    ("pecans", "pecan"),
    ("cashews", "cashew"),
    ("peanuts", "peanut"),
    ("anchovies", "anchovy"),
    ("sausages", "sausage"),
    ("breasts", "breast"),
    ("chicken breasts", "chicken breast"),
    ("thighs", "thigh"),
    ("chicken thighs", "chicken thigh"),
    ("drumsticks", "drumstick"),
    ("shrimps", "shrimp"),
    ("prawns", "prawn"),
    ("scallops", "scallop"),
    ("tortillas", "tortilla"),
    ("bagels", "bagel"),
    ("buns", "bun"),
    ("rolls", "roll"),
    ("croissants", "croissant"),
    ("muffins", "muffin"),
    ("noodles", "noodle"),
    ("crackers", "cracker"),
    ("chips", "chip"),
    ("herbs", "herb"),
    ("spices", "spice"),
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref PARENTHETICAL: Regex = Regex::new(r"\([^)]*\)").unwrap();
    static ref DESCRIPTOR_PATTERN: Regex = {
        let mut phrases: Vec<&str> = DESCRIPTORS.to_vec();
        // Longest first so "finely chopped" wins over "chopped"
        phrases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"\b(?:{alternation})\b")).unwrap()
    };
    static ref PLURAL_MAP: HashMap<&'static str, &'static str> = PLURALS.iter().copied().collect();
}

/// Canonicalize a free-text ingredient name into a stable comparison key.
///
/// Never fails; the worst case is the trimmed lowercase input.
#[must_use]
pub fn normalize(raw_name: &str) -> String {
    let mut name = collapse_whitespace(&raw_name.to_lowercase());
    if name.is_empty() {
        return name;
    }

    if !contains_keep_term(&name) {
        name = DESCRIPTOR_PATTERN.replace_all(&name, " ").into_owned();
        name = collapse_whitespace(&name);
    }

    // Asides and trailing commas would hide the last word from the plural table
    name = strip_asides(&name);
    name = singularize(&name);
    strip_asides(&name)
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn contains_keep_term(name: &str) -> bool {
    KEEP_TERMS.iter().any(|term| name.contains(term))
}

fn strip_asides(name: &str) -> String {
    let without = PARENTHETICAL.replace_all(name, " ");
    let collapsed = collapse_whitespace(&without);
    collapse_whitespace(
        collapsed
            .trim_start_matches([',', ' '])
            .trim_end_matches([',', ' ']),
    )
}

fn singularize(name: &str) -> String {
    if let Some(single) = PLURAL_MAP.get(name) {
        return (*single).to_string();
    }
    match name.rsplit_once(' ') {
        Some((head, last)) => match PLURAL_MAP.get(last) {
            Some(single) => format!("{head} {single}"),
            None => name.to_string(),
        },
        None => name.to_string(),
    }
}
