//! Catalog models used by the stock ledger

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock-relevant view of a product: everything the ledger needs to
/// validate and apply a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductStock {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_composite: bool,
    /// Not authoritative for composite products
    pub stock: Decimal,
    /// Quantity deducted from `stock` per sold unit
    pub unit_size: Decimal,
    pub unit: String,
    /// Deactivated products can no longer be added to orders
    pub is_active: bool,
    pub ingredients: Vec<IngredientRequirement>,
}

/// Quantity of an ingredient product needed for one portion of a composite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientRequirement {
    pub ingredient_id: Uuid,
    pub quantity: Decimal,
}

/// Number of whole units that `stock` covers when each unit needs `per_unit`.
///
/// Non-positive stock or a non-positive requirement yields 0.
pub fn whole_units(stock: Decimal, per_unit: Decimal) -> i64 {
    if stock <= Decimal::ZERO || per_unit <= Decimal::ZERO {
        return 0;
    }
    (stock / per_unit).floor().to_i64().unwrap_or(i64::MAX)
}

/// Portions of a composite product that can be assembled from
/// `(ingredient_stock, quantity_per_portion)` pairs: the minimum over the
/// limiting ingredient, 0 without ingredients.
pub fn available_portions<I>(requirements: I) -> i64
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    requirements
        .into_iter()
        .map(|(stock, per_portion)| whole_units(stock, per_portion))
        .min()
        .unwrap_or(0)
}

/// Whether a product with the given stock is at or below its alert threshold
pub fn is_low_stock(available: Decimal, threshold: Decimal) -> bool {
    available <= threshold
}
