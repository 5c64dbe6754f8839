use lazy_static::lazy_static;
use regex::Regex;

use crate::models::ShoppingListCategory;

/// Checked before the precedence scan.
const OVERRIDES: &[(&str, ShoppingListCategory)] = &[
    ("frozen", ShoppingListCategory::Frozen),
    ("ice cream", ShoppingListCategory::Frozen),
    ("broth", ShoppingListCategory::Pantry),
    ("stock", ShoppingListCategory::Pantry),
    ("bouillon", ShoppingListCategory::Pantry),
    ("peanut butter", ShoppingListCategory::Pantry),
    ("sausage", ShoppingListCategory::MeatSeafood),
    ("chickpea", ShoppingListCategory::Pantry),
    ("cornstarch", ShoppingListCategory::Pantry),
    ("cornmeal", ShoppingListCategory::Pantry),
    ("tomato paste", ShoppingListCategory::Pantry),
    ("tomato sauce", ShoppingListCategory::Pantry),
    ("canned", ShoppingListCategory::Pantry),
];

const PRODUCE: &[&str] = &[
    "lettuce",
    "spinach",
    "kale",
    "arugula",
    "cabbage",
    "broccoli",
    "cauliflower",
    "carrot",
    "celery",
    "cucumber",
    "zucchini",
    "squash",
    "pumpkin",
    "eggplant",
    "tomato",
    "potato",
    "onion",
    "shallot",
    "scallion",
    "leek",
    "garlic",
    "ginger",
    "bell pepper",
    "jalapeno",
    "chili",
    "mushroom",
    "asparagus",
    "green bean",
    "peas",
    "corn",
    "radish",
    "beet",
    "avocado",
    "sprout",
    "parsley",
    "cilantro",
    "basil",
    "mint",
    "dill",
    "thyme",
    "rosemary",
    "sage",
    "chive",
    "apple",
    "banana",
    "orange",
    "lemon",
    "lime",
    "grapefruit",
    "berry",
    "strawberry",
    "blueberry",
    "raspberry",
    "blackberry",
    "cranberry",
    "cherry",
    "grape",
    "peach",
    "pear",
    "plum",
    "apricot",
    "mango",
    "pineapple",
    "melon",
    "kiwi",
    "fig",
];

const DAIRY: &[&str] = &[
    "milk",
    "buttermilk",
    "cream",
    "butter",
    "cheese",
    "cheddar",
    "mozzarella",
    "parmesan",
    "ricotta",
    "feta",
    "yogurt",
    "yoghurt",
    "egg",
    "ghee",
    "kefir",
];

const MEAT_SEAFOOD: &[&str] = &[
    "chicken",
    "beef",
    "pork",
    "lamb",
    "turkey",
    "veal",
    "duck",
    "bacon",
    "ham",
    "sausage",
    "chorizo",
    "prosciutto",
    "salami",
    "steak",
    "mince",
    "meatball",
    "salmon",
    "tuna",
    "cod",
    "tilapia",
    "halibut",
    "trout",
    "fish",
    "shrimp",
    "prawn",
    "crab",
    "lobster",
    "scallop",
    "mussel",
    "clam",
    "anchovy",
];

const PANTRY: &[&str] = &[
    "flour",
    "sugar",
    "salt",
    "pepper",
    "oil",
    "vinegar",
    "rice",
    "pasta",
    "spaghetti",
    "noodle",
    "oat",
    "quinoa",
    "couscous",
    "bean",
    "lentil",
    "baking powder",
    "baking soda",
    "yeast",
    "vanilla",
    "honey",
    "syrup",
    "sauce",
    "ketchup",
    "mustard",
    "mayonnaise",
    "cumin",
    "paprika",
    "cinnamon",
    "oregano",
    "nutmeg",
    "turmeric",
    "spice",
    "almond",
    "walnut",
    "pecan",
    "cashew",
    "peanut",
    "raisin",
    "cereal",
    "cracker",
    "chocolate",
    "cocoa",
    "coffee",
    "tea",
];

const FROZEN: &[&str] = &["frozen", "ice cream", "sorbet", "popsicle"];

const BAKERY: &[&str] = &[
    "bread",
    "baguette",
    "bun",
    "roll",
    "bagel",
    "breadcrumb",
    "tortilla",
    "pita",
    "naan",
    "croissant",
    "muffin",
    "brioche",
    "ciabatta",
    "sourdough",
    "cake",
    "donut",
];

/// Precedence order for the keyword scan. Other has no keywords.
const PRECEDENCE: &[(ShoppingListCategory, &[&str])] = &[
    (ShoppingListCategory::Produce, PRODUCE),
    (ShoppingListCategory::Dairy, DAIRY),
    (ShoppingListCategory::MeatSeafood, MEAT_SEAFOOD),
    (ShoppingListCategory::Pantry, PANTRY),
    (ShoppingListCategory::Frozen, FROZEN),
    (ShoppingListCategory::Bakery, BAKERY),
];

lazy_static! {
    static ref OVERRIDE_PATTERNS: Vec<(Regex, ShoppingListCategory)> = OVERRIDES
        .iter()
        .map(|(kw, category)| (keyword_pattern(&[*kw]), *category))
        .collect();
    static ref CATEGORY_PATTERNS: Vec<(ShoppingListCategory, Regex)> = PRECEDENCE
        .iter()
        .map(|(category, keywords)| (*category, keyword_pattern(keywords)))
        .collect();
}

/// Whole-word alternation over `keywords`, each also accepting its plural
/// ("tomato" matches "tomatoes", "berry" matches "berries").
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let mut words: Vec<&str> = keywords.to_vec();
    // Longest first so "green bean" is tried before "bean"
    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = words
        .iter()
        .map(|kw| with_plural(kw))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).unwrap()
}

fn with_plural(keyword: &str) -> String {
    let escaped = regex::escape(keyword);
    let consonant_y = keyword
        .strip_suffix('y')
        .and_then(|stem| stem.chars().last())
        .is_some_and(|c| !"aeiou".contains(c));
    match escaped.strip_suffix('y') {
        Some(stem) if consonant_y => format!("{stem}(?:y|ies)"),
        _ => format!("{escaped}(?:e?s)?"),
    }
}

/// Classify a (normalized or raw) ingredient name into a store aisle.
///
/// Keywords match whole words only, so "sage" never hits "sausage" and
/// "ham" never hits "graham". Overrides are consulted first for names whose
/// aisle is decided by a word that would otherwise lose on precedence
/// ("frozen vegetable", "chicken broth", "ice cream"). Then categories are
/// scanned in a fixed order (Produce, Dairy, Meat & Seafood, Pantry, Frozen,
/// Bakery) and the first hit wins.
#[must_use]
pub fn classify(name: &str) -> ShoppingListCategory {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return ShoppingListCategory::Other;
    }

    if let Some((_, category)) = OVERRIDE_PATTERNS.iter().find(|(re, _)| re.is_match(&lower)) {
        return *category;
    }

    CATEGORY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map_or(ShoppingListCategory::Other, |(category, _)| *category)
}

/// All categories in display order.
#[must_use]
pub fn all_categories() -> Vec<ShoppingListCategory> {
    ShoppingListCategory::ALL.to_vec()
}

/// Strict membership test against the category labels.
#[must_use]
pub fn is_valid_category(label: &str) -> bool {
    ShoppingListCategory::ALL
        .iter()
        .any(|c| c.as_str() == label)
}

/// Copy of the keyword list for `category` (empty for Other).
#[must_use]
pub fn keywords_for(category: ShoppingListCategory) -> Vec<String> {
    PRECEDENCE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, keywords)| keywords.iter().map(|k| (*k).to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use ShoppingListCategory::{Bakery, Dairy, Frozen, MeatSeafood, Other, Pantry, Produce};

    #[test]
    fn test_classify_table() {
        let cases = [
            ("tomato", Produce),
            ("Cherry Tomato", Produce),
            ("eggplant", Produce),
            ("green onion", Produce),
            ("milk", Dairy),
            ("cheddar cheese", Dairy),
            ("egg", Dairy),
            ("greek yogurt", Dairy),
            ("chicken breast", MeatSeafood),
            ("salmon fillet", MeatSeafood),
            ("shrimp", MeatSeafood),
            ("olive oil", Pantry),
            ("all-purpose flour", Pantry),
            ("black beans", Pantry),
            ("chicken broth", Pantry),
            ("peanut butter", Pantry),
            ("chickpea", Pantry),
            ("frozen vegetable", Frozen),
            ("frozen peas", Frozen),
            ("vanilla ice cream", Frozen),
            ("sorbet", Frozen),
            ("sourdough bread", Bakery),
            ("tortilla", Bakery),
            ("bagel", Bakery),
            ("batteries", Other),
            ("paper towels", Other),
            ("strawberries", Produce),
            ("buttermilk", Dairy),
        ];
        for (name, expected) in cases {
            assert_eq!(classify(name), expected, "{name}");
        }
    }

    #[test]
    fn test_short_keywords_match_whole_words() {
        let cases = [
            ("sausage", MeatSeafood),
            ("Italian Sausages", MeatSeafood),
            ("chorizo sausage", MeatSeafood),
            ("graham crackers", Pantry),
            ("hamburger buns", Bakery),
            ("sage", Produce),
            ("ham", MeatSeafood),
            ("aluminum foil", Other),
            ("green tea", Pantry),
        ];
        for (name, expected) in cases {
            assert_eq!(classify(&normalize(name)), expected, "{name}");
            assert_eq!(classify(name), expected, "{name}");
        }
    }

    #[test]
    fn test_frozen_beats_produce() {
        assert_eq!(classify("frozen vegetable"), Frozen);
        assert_eq!(classify("Frozen Strawberries"), Frozen);
    }

    #[test]
    fn test_case_and_whitespace_tolerant() {
        assert_eq!(classify("  MILK  "), Dairy);
        assert_eq!(classify(""), Other);
        assert_eq!(classify("   "), Other);
    }

    #[test]
    fn test_variants_classify_identically() {
        let names = ["Fresh Tomatoes", "  tomato  ", "TOMATO"];
        for name in names {
            assert_eq!(classify(&normalize(name)), Produce, "{name}");
            assert_eq!(classify(name), Produce, "{name}");
        }
    }

    #[test]
    fn test_all_categories_display_order() {
        let labels: Vec<&str> = all_categories().iter().map(|c| c.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Produce",
                "Dairy",
                "Meat & Seafood",
                "Pantry",
                "Frozen",
                "Bakery",
                "Other"
            ]
        );
    }

    #[test]
    fn test_is_valid_category() {
        assert!(is_valid_category("Meat & Seafood"));
        assert!(is_valid_category("Other"));
        assert!(!is_valid_category("meat"));
        assert!(!is_valid_category("Snacks"));
    }

    #[test]
    fn test_keywords_for_returns_copy() {
        let mut produce = keywords_for(Produce);
        assert!(produce.contains(&"tomato".to_string()));
        produce.clear();
        assert!(!keywords_for(Produce).is_empty());
        assert!(keywords_for(Other).is_empty());
        assert!(keywords_for(Frozen).contains(&"ice cream".to_string()));
    }
}
