//! Stock ledger tests
//!
//! Tests for order-driven stock movements including:
//! - Order totals always match their line items
//! - Adding and removing a line is stock neutral
//! - Composite availability is limited by the scarcest ingredient
//! - Rejected additions leave stock and items untouched

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::ledger::{
    add_item_to_order, items_delta, remove_item_from_order, replace_items, LedgerError, StockBook,
    EMPTIED_ORDER_COMMENT,
};
use shared::{
    available_portions, calculate_total, IngredientRequirement, NewOrderItem, Order, OrderStatus,
    ProductStock,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn simple(name: &str, price: Decimal, stock: Decimal, unit_size: Decimal) -> ProductStock {
    ProductStock {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
        is_composite: false,
        stock,
        unit_size,
        unit: "pcs".to_string(),
        is_active: true,
        ingredients: vec![],
    }
}

fn composite(name: &str, price: Decimal, ingredients: &[(Uuid, Decimal)]) -> ProductStock {
    ProductStock {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
        is_composite: true,
        stock: Decimal::ZERO,
        unit_size: Decimal::ONE,
        unit: "pcs".to_string(),
        is_active: true,
        ingredients: ingredients
            .iter()
            .map(|(ingredient_id, quantity)| IngredientRequirement {
                ingredient_id: *ingredient_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

fn new_order() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        guest_id: None,
        guest_name: "Table 4".to_string(),
        user_id: Uuid::new_v4(),
        shift_id: None,
        order_items: vec![],
        total_amount: Decimal::ZERO,
        status: OrderStatus::Active,
        payment_method: None,
        comment: None,
        created_at: now,
        updated_at: now,
        closed_at: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Rum 0.05 L per portion with 1.0 L, lime 1 per portion with 3
    #[test]
    fn test_mojito_availability_and_sale() {
        let rum = simple("Rum", dec("0"), dec("1.0"), dec("0.05"));
        let lime = simple("Lime", dec("0"), dec("3"), dec("1"));
        let mojito = composite(
            "Mojito",
            dec("450"),
            &[(rum.id, dec("0.05")), (lime.id, dec("1"))],
        );
        let (rum_id, lime_id, mojito_id) = (rum.id, lime.id, mojito.id);
        let mut book = StockBook::new([rum, lime, mojito]);

        assert_eq!(book.available_quantity(mojito_id).unwrap(), 3);

        let mut order = new_order();
        add_item_to_order(&mut order, &mut book, mojito_id, 2).unwrap();

        assert_eq!(book.stock(rum_id), Some(dec("0.9")));
        assert_eq!(book.stock(lime_id), Some(dec("1")));
        assert_eq!(book.available_quantity(mojito_id).unwrap(), 1);
        assert_eq!(order.total_amount, dec("900"));
    }

    /// Order [{P1, 2, 100}, {P2, 1, 50}] totals 250; removing index 0 leaves 50
    #[test]
    fn test_remove_first_line_returns_its_stock() {
        let p1 = simple("Lager", dec("100"), dec("10"), dec("0.5"));
        let p2 = simple("Chips", dec("50"), dec("10"), dec("1"));
        let (p1_id, p2_id) = (p1.id, p2.id);
        let mut book = StockBook::new([p1, p2]);
        let mut order = new_order();

        add_item_to_order(&mut order, &mut book, p1_id, 2).unwrap();
        add_item_to_order(&mut order, &mut book, p2_id, 1).unwrap();
        assert_eq!(order.total_amount, dec("250"));
        assert_eq!(book.stock(p1_id), Some(dec("9")));

        let (removed, changes) =
            remove_item_from_order(&mut order, &mut book, 0, Utc::now()).unwrap();

        assert_eq!(removed.product_id, p1_id);
        assert_eq!(changes.get(&p1_id), Some(&dec("1.0")));
        assert_eq!(order.total_amount, dec("50"));
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(book.stock(p1_id), Some(dec("10")));
        assert!(order.is_active());
    }

    /// Removing the only line cancels the order
    #[test]
    fn test_removing_last_line_cancels_order() {
        let beer = simple("Beer", dec("120"), dec("5"), dec("1"));
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = new_order();

        add_item_to_order(&mut order, &mut book, beer_id, 3).unwrap();
        remove_item_from_order(&mut order, &mut book, 0, Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.total_amount, Decimal::ZERO);
        assert_eq!(order.comment.as_deref(), Some(EMPTIED_ORDER_COMMENT));
        assert!(order.closed_at.is_some());
        assert_eq!(book.stock(beer_id), Some(dec("5")));
    }

    /// Out-of-range index is rejected without side effects
    #[test]
    fn test_invalid_index() {
        let beer = simple("Beer", dec("120"), dec("5"), dec("1"));
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = new_order();
        add_item_to_order(&mut order, &mut book, beer_id, 1).unwrap();

        let err = remove_item_from_order(&mut order, &mut book, 1, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::InvalidIndex { index: 1, len: 1 });
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(book.stock(beer_id), Some(dec("4")));
    }

    /// A composite with no recipe cannot be sold
    #[test]
    fn test_composite_without_ingredients_is_unavailable() {
        let house_special = composite("House special", dec("500"), &[]);
        let id = house_special.id;
        let mut book = StockBook::new([house_special]);

        assert_eq!(book.available_quantity(id).unwrap(), 0);
        let mut order = new_order();
        assert!(matches!(
            add_item_to_order(&mut order, &mut book, id, 1),
            Err(LedgerError::InsufficientStock { available: 0, .. })
        ));
    }

    /// Full replacement moves stock by the difference only
    #[test]
    fn test_replace_items_applies_difference() {
        let beer = simple("Beer", dec("100"), dec("20"), dec("1"));
        let wine = simple("Wine", dec("300"), dec("1.5"), dec("0.15"));
        let (beer_id, wine_id) = (beer.id, wine.id);
        let mut book = StockBook::new([beer, wine]);
        let mut order = new_order();

        replace_items(
            &mut order,
            &mut book,
            &[NewOrderItem { product_id: beer_id, quantity: 4 }],
        )
        .unwrap();
        assert_eq!(book.stock(beer_id), Some(dec("16")));

        let changes = replace_items(
            &mut order,
            &mut book,
            &[
                NewOrderItem { product_id: beer_id, quantity: 1 },
                NewOrderItem { product_id: wine_id, quantity: 2 },
            ],
        )
        .unwrap();

        assert_eq!(changes.get(&beer_id), Some(&dec("3")));
        assert_eq!(changes.get(&wine_id), Some(&dec("-0.30")));
        assert_eq!(book.stock(beer_id), Some(dec("19")));
        assert_eq!(book.stock(wine_id), Some(dec("1.2")));
        assert_eq!(order.total_amount, dec("700"));
    }

    /// Shrinking a line that is already over-sold is allowed
    #[test]
    fn test_replace_items_only_checks_increases() {
        let beer = simple("Beer", dec("100"), dec("3"), dec("1"));
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = new_order();

        replace_items(
            &mut order,
            &mut book,
            &[NewOrderItem { product_id: beer_id, quantity: 3 }],
        )
        .unwrap();
        assert_eq!(book.available_quantity(beer_id).unwrap(), 0);

        replace_items(
            &mut order,
            &mut book,
            &[NewOrderItem { product_id: beer_id, quantity: 2 }],
        )
        .unwrap();
        assert_eq!(book.stock(beer_id), Some(dec("1")));

        let err = replace_items(
            &mut order,
            &mut book,
            &[NewOrderItem { product_id: beer_id, quantity: 4 }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { requested: 2, available: 1, .. }
        ));
        assert_eq!(order.order_items[0].quantity, 2);
    }

    /// Cocktails sharing a spirit are checked against the same bottle
    #[test]
    fn test_replace_items_checks_shared_ingredient_together() {
        let rum = simple("Rum", dec("0"), dec("3"), dec("1"));
        let rum_id = rum.id;
        let mojito = composite("Mojito", dec("450"), &[(rum_id, dec("1"))]);
        let daiquiri = composite("Daiquiri", dec("500"), &[(rum_id, dec("1"))]);
        let (mojito_id, daiquiri_id) = (mojito.id, daiquiri.id);
        let mut book = StockBook::new([rum, mojito, daiquiri]);
        let mut order = new_order();

        let err = replace_items(
            &mut order,
            &mut book,
            &[
                NewOrderItem { product_id: mojito_id, quantity: 3 },
                NewOrderItem { product_id: daiquiri_id, quantity: 3 },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 0, .. }));
        assert!(order.order_items.is_empty());
        assert_eq!(book.stock(rum_id), Some(dec("3")));

        // Rum sold neat competes with the cocktails for the same stock
        let err = replace_items(
            &mut order,
            &mut book,
            &[
                NewOrderItem { product_id: mojito_id, quantity: 2 },
                NewOrderItem { product_id: rum_id, quantity: 2 },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
        assert_eq!(book.stock(rum_id), Some(dec("3")));

        replace_items(
            &mut order,
            &mut book,
            &[
                NewOrderItem { product_id: mojito_id, quantity: 2 },
                NewOrderItem { product_id: daiquiri_id, quantity: 1 },
            ],
        )
        .unwrap();
        assert_eq!(book.stock(rum_id), Some(dec("0")));

        // Swapping a Mojito for a Daiquiri frees the rum it needs
        replace_items(
            &mut order,
            &mut book,
            &[
                NewOrderItem { product_id: mojito_id, quantity: 1 },
                NewOrderItem { product_id: daiquiri_id, quantity: 2 },
            ],
        )
        .unwrap();
        assert_eq!(book.stock(rum_id), Some(dec("0")));
        assert_eq!(order.total_amount, dec("1450"));
    }

    /// Identical item lists produce no delta
    #[test]
    fn test_items_delta_of_identical_lists_is_empty() {
        let beer = simple("Beer", dec("100"), dec("3"), dec("1"));
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = new_order();
        add_item_to_order(&mut order, &mut book, beer_id, 2).unwrap();

        assert!(items_delta(&order.order_items, &order.order_items).is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating unit sizes (0.01 to 2.00)
    fn unit_size_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=200i64).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for generating prices (1.00 to 1000.00)
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (100i64..=100000i64).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for an edit: add (product, quantity) or remove a line
    fn edit_strategy() -> impl Strategy<Value = (bool, usize, i32)> {
        (any::<bool>(), 0usize..4, 1i32..=5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Total always equals the sum of price x quantity
        #[test]
        fn prop_total_matches_items(
            prices in prop::collection::vec(price_strategy(), 4),
            edits in prop::collection::vec(edit_strategy(), 1..30),
        ) {
            let products: Vec<ProductStock> = prices
                .iter()
                .enumerate()
                .map(|(i, price)| simple(&format!("P{}", i), *price, dec("10000"), Decimal::ONE))
                .collect();
            let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
            let mut book = StockBook::new(products);
            let mut order = new_order();

            for (add, which, quantity) in edits {
                if add || order.order_items.is_empty() {
                    add_item_to_order(&mut order, &mut book, ids[which], quantity).unwrap();
                } else {
                    let index = which % order.order_items.len();
                    remove_item_from_order(&mut order, &mut book, index, Utc::now()).unwrap();
                }

                prop_assert_eq!(order.total_amount, calculate_total(&order.order_items));
                if !order.is_active() {
                    prop_assert_eq!(order.total_amount, Decimal::ZERO);
                    break;
                }
            }
        }

        /// Adding q of a simple product then removing the line restores stock
        #[test]
        fn prop_simple_add_remove_is_neutral(
            unit_size in unit_size_strategy(),
            quantity in 1i32..=50,
            spare in 0i64..=500,
        ) {
            let stock = unit_size * Decimal::from(i64::from(quantity) + spare);
            let product = simple("Beer", dec("100"), stock, unit_size);
            let id = product.id;
            let mut book = StockBook::new([product]);
            let mut order = new_order();

            add_item_to_order(&mut order, &mut book, id, quantity).unwrap();
            prop_assert_eq!(
                book.stock(id).unwrap(),
                stock - unit_size * Decimal::from(quantity)
            );

            remove_item_from_order(&mut order, &mut book, 0, Utc::now()).unwrap();
            prop_assert_eq!(book.stock(id).unwrap(), stock);
        }

        /// Same for a composite product: every ingredient is restored
        #[test]
        fn prop_composite_add_remove_is_neutral(
            per_portion in prop::collection::vec(unit_size_strategy(), 1..4),
            quantity in 1i32..=20,
        ) {
            let ingredients: Vec<ProductStock> = per_portion
                .iter()
                .enumerate()
                .map(|(i, q)| simple(&format!("I{}", i), Decimal::ZERO, *q * Decimal::from(100), Decimal::ONE))
                .collect();
            let recipe: Vec<(Uuid, Decimal)> = ingredients
                .iter()
                .zip(&per_portion)
                .map(|(p, q)| (p.id, *q))
                .collect();
            let before: Vec<(Uuid, Decimal)> = ingredients.iter().map(|p| (p.id, p.stock)).collect();
            let cocktail = composite("Cocktail", dec("450"), &recipe);
            let cocktail_id = cocktail.id;

            let mut book = StockBook::new(ingredients);
            book.insert(cocktail);
            let mut order = new_order();

            add_item_to_order(&mut order, &mut book, cocktail_id, quantity).unwrap();
            for ((id, original), (_, q)) in before.iter().zip(&recipe) {
                prop_assert_eq!(
                    book.stock(*id).unwrap(),
                    *original - *q * Decimal::from(quantity)
                );
            }

            remove_item_from_order(&mut order, &mut book, 0, Utc::now()).unwrap();
            for (id, original) in &before {
                prop_assert_eq!(book.stock(*id).unwrap(), *original);
            }
        }

        /// Available portions = min over ingredients of floor(stock / per portion)
        #[test]
        fn prop_available_portions_formula(
            requirements in prop::collection::vec((0i64..=10000, 1i64..=500), 0..5),
        ) {
            let expected = requirements
                .iter()
                .map(|(stock, per)| stock / per)
                .min()
                .unwrap_or(0);
            let decimals = requirements
                .iter()
                .map(|(stock, per)| (Decimal::new(*stock, 2), Decimal::new(*per, 2)));

            prop_assert_eq!(available_portions(decimals), expected);
        }

        /// Adding more than is available fails and changes nothing
        #[test]
        fn prop_insufficient_stock_is_side_effect_free(
            unit_size in unit_size_strategy(),
            units in 0i64..=20,
            extra in 1i32..=10,
        ) {
            let stock = unit_size * Decimal::from(units);
            let product = simple("Wine", dec("300"), stock, unit_size);
            let id = product.id;
            let mut book = StockBook::new([product]);
            let mut order = new_order();
            let requested = units as i32 + extra;

            let err = add_item_to_order(&mut order, &mut book, id, requested).unwrap_err();

            prop_assert_eq!(
                err,
                LedgerError::InsufficientStock {
                    product_id: id,
                    product_name: "Wine".to_string(),
                    requested: i64::from(requested),
                    available: units,
                }
            );
            prop_assert!(order.order_items.is_empty());
            prop_assert_eq!(order.total_amount, Decimal::ZERO);
            prop_assert_eq!(book.stock(id).unwrap(), stock);
        }

        /// Stock after a full replacement equals start minus what the order holds
        #[test]
        fn prop_replace_items_conserves_stock(
            first in prop::collection::vec((0usize..3, 1i32..=5), 1..6),
            second in prop::collection::vec((0usize..3, 1i32..=5), 1..6),
        ) {
            let products: Vec<ProductStock> = (0..3)
                .map(|i| simple(&format!("P{}", i), dec("10"), dec("500"), dec("0.5")))
                .collect();
            let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
            let mut book = StockBook::new(products);
            let mut order = new_order();

            let to_items = |lines: &[(usize, i32)]| -> Vec<NewOrderItem> {
                lines
                    .iter()
                    .map(|(i, q)| NewOrderItem { product_id: ids[*i], quantity: *q })
                    .collect()
            };

            replace_items(&mut order, &mut book, &to_items(&first)).unwrap();
            replace_items(&mut order, &mut book, &to_items(&second)).unwrap();

            for id in &ids {
                let held: i32 = order
                    .order_items
                    .iter()
                    .filter(|item| item.product_id == *id)
                    .map(|item| item.quantity)
                    .sum();
                prop_assert_eq!(
                    book.stock(*id).unwrap(),
                    dec("500") - dec("0.5") * Decimal::from(held)
                );
            }
            prop_assert_eq!(order.total_amount, calculate_total(&order.order_items));
        }
    }
}
