//! Validation utilities for the bar point-of-sale system

use rust_decimal::Decimal;

use crate::models::IngredientRequirement;

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate a price or cost price (zero allowed, e.g. for ingredients)
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate the quantity deducted per sold unit
pub fn validate_unit_size(unit_size: Decimal) -> Result<(), &'static str> {
    if unit_size <= Decimal::ZERO {
        return Err("Unit size must be positive");
    }
    Ok(())
}

/// Validate a low-stock alert threshold
pub fn validate_threshold(threshold: Decimal) -> Result<(), &'static str> {
    if threshold < Decimal::ZERO {
        return Err("Low stock threshold cannot be negative");
    }
    Ok(())
}

/// Validate a composite product's recipe
pub fn validate_ingredients(
    product_id: uuid::Uuid,
    ingredients: &[IngredientRequirement],
) -> Result<(), &'static str> {
    for (i, link) in ingredients.iter().enumerate() {
        if link.quantity <= Decimal::ZERO {
            return Err("Ingredient quantity must be positive");
        }
        if link.ingredient_id == product_id {
            return Err("A product cannot be its own ingredient");
        }
        if ingredients[..i]
            .iter()
            .any(|other| other.ingredient_id == link.ingredient_id)
        {
            return Err("Each ingredient may appear only once");
        }
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate a sold quantity
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Normalize a guest name typed by staff: trims and collapses whitespace
pub fn normalize_guest_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a guest name is a seating placeholder ("Bar", "Table") or empty
/// rather than a person. Matching is case-insensitive and ignores a trailing
/// table number, so "table 4" matches the placeholder "Table".
pub fn is_placeholder_guest_name(name: &str, placeholders: &[String]) -> bool {
    let normalized = normalize_guest_name(name).to_lowercase();
    if normalized.is_empty() {
        return true;
    }
    let base = normalized
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '#' || c.is_whitespace());

    placeholders.iter().any(|p| {
        let p = p.trim().to_lowercase();
        !p.is_empty() && (p == normalized || p == base)
    })
}

// ============================================================================
// Account Validations
// ============================================================================

/// Validate username format (3-32 chars, lowercase alphanumeric, `_`, `.`)
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters");
    }
    if username.len() > 32 {
        return Err("Username must be at most 32 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err("Username may contain lowercase letters, digits, '_' and '.' only");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}
