//! Price Table Module
//! Average unit price per product family, with caller overrides.

use std::collections::HashMap;

/// Average price of an item purchased in each department.
pub const BASE_PRICES: &[(&str, f64)] = &[
    ("AUTOMOTIVE", 28.0),
    ("BABY CARE", 9.0),
    ("BEAUTY", 12.0),
    ("BEVERAGES", 5.0),
    ("BOOKS", 15.0),
    ("BREAD/BAKERY", 6.0),
    ("CELEBRATION", 10.0),
    ("CLEANING", 5.0),
    ("DAIRY", 3.0),
    ("DELI", 8.0),
    ("EGGS", 3.0),
    ("FROZEN FOODS", 5.0),
    ("GROCERY I", 4.0),
    ("GROCERY II", 6.0),
    ("HARDWARE", 20.0),
    ("HOME AND KITCHEN I", 9.0),
    ("HOME AND KITCHEN II", 16.0),
    ("HOME APPLIANCES", 50.0),
    ("HOME CARE", 5.0),
    ("LADIESWEAR", 20.0),
    ("LAWN AND GARDEN", 18.0),
    ("LINGERIE", 25.0),
    ("LIQUOR,WINE,BEER", 25.0),
    ("MAGAZINES", 5.0),
    ("MEATS", 13.0),
    ("PERSONAL CARE", 4.0),
    ("PET SUPPLIES", 10.0),
    ("PLAYERS AND ELECTRONICS", 47.0),
    ("POULTRY", 8.0),
    ("PREPARED FOODS", 8.0),
    ("PRODUCE", 1.5),
    ("SCHOOL AND OFFICE SUPPLIES", 11.0),
    ("SEAFOOD", 17.0),
];

/// Family name to average unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceTable {
    /// Table holding the built-in default prices.
    pub fn new() -> Self {
        Self {
            prices: BASE_PRICES
                .iter()
                .map(|(family, price)| (family.to_string(), *price))
                .collect(),
        }
    }

    /// Default prices with `overrides` merged on top. Overrides win per family.
    pub fn with_overrides(overrides: &HashMap<String, f64>) -> Self {
        let mut table = Self::new();
        table.merge(overrides);
        table
    }

    pub fn merge(&mut self, overrides: &HashMap<String, f64>) {
        self.prices
            .extend(overrides.iter().map(|(family, price)| (family.clone(), *price)));
    }

    pub fn get(&self, family: &str) -> Option<f64> {
        self.prices.get(family).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
