//! Order stock ledger
//!
//! Keeps product stock consistent with order line items. Every edit to an
//! order's items is reduced to a per-product quantity delta; each delta is
//! then turned into stock changes, either on the product itself (simple
//! products, `delta * unit_size`) or on its ingredients (composite products,
//! `delta * quantity_per_portion`).
//!
//! The functions here are storage independent. Callers load the touched
//! products into a [`StockBook`], run an operation, then persist the returned
//! [`StockChanges`] and the mutated [`Order`] in the same transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    available_portions, whole_units, NewOrderItem, Order, OrderItem, OrderStatus, PaymentMethod,
    ProductStock,
};

/// Comment recorded when removing the last item cancels an order
pub const EMPTIED_ORDER_COMMENT: &str = "Cancelled automatically: last item removed";

/// Signed stock change per stock-bearing product (negative = deducted),
/// ordered by product id
pub type StockChanges = BTreeMap<Uuid, Decimal>;

/// Ledger failures. None of them leave partial changes behind.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("order is {0}; only active orders can be changed")]
    InvalidState(OrderStatus),

    #[error("not enough {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        requested: i64,
        available: i64,
    },

    #[error("item index {index} is out of range for an order with {len} items")]
    InvalidIndex { index: usize, len: usize },

    #[error("product {0} was not loaded into the stock book")]
    UnknownProduct(Uuid),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("quantity {0} exceeds the largest line quantity")]
    QuantityTooLarge(i64),

    #[error("{product_name} is no longer sold")]
    InactiveProduct {
        product_id: Uuid,
        product_name: String,
    },

    #[error("payment method is required to complete an order")]
    PaymentMethodRequired,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Total quantity per product over a list of line items
pub fn quantity_map(items: &[OrderItem]) -> BTreeMap<Uuid, i64> {
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }
    map
}

/// Nonzero `new - old` quantity per product over the union of both lists
pub fn items_delta(old: &[OrderItem], new: &[OrderItem]) -> BTreeMap<Uuid, i64> {
    let old_map = quantity_map(old);
    let mut new_map = quantity_map(new);

    for (product_id, old_qty) in old_map {
        *new_map.entry(product_id).or_insert(0) -= old_qty;
    }
    new_map.retain(|_, delta| *delta != 0);
    new_map
}

/// In-memory snapshot of the products an operation touches: the sold
/// products and every ingredient they reference.
#[derive(Debug, Clone, Default)]
pub struct StockBook {
    products: BTreeMap<Uuid, ProductStock>,
}

impl StockBook {
    pub fn new<I>(products: I) -> Self
    where
        I: IntoIterator<Item = ProductStock>,
    {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn insert(&mut self, product: ProductStock) {
        self.products.insert(product.id, product);
    }

    pub fn product(&self, product_id: Uuid) -> LedgerResult<&ProductStock> {
        self.products
            .get(&product_id)
            .ok_or(LedgerError::UnknownProduct(product_id))
    }

    pub fn stock(&self, product_id: Uuid) -> Option<Decimal> {
        self.products.get(&product_id).map(|p| p.stock)
    }

    /// Units of a product that can be sold right now: available portions for
    /// composite products, `floor(stock / unit_size)` for simple ones
    pub fn available_quantity(&self, product_id: Uuid) -> LedgerResult<i64> {
        let product = self.product(product_id)?;
        if !product.is_composite {
            return Ok(whole_units(product.stock, product.unit_size));
        }

        let mut requirements = Vec::with_capacity(product.ingredients.len());
        for link in &product.ingredients {
            let ingredient = self.product(link.ingredient_id)?;
            requirements.push((ingredient.stock, link.quantity));
        }
        Ok(available_portions(requirements))
    }

    /// Fails with `InsufficientStock` when `quantity` units are not available
    pub fn ensure_available(&self, product_id: Uuid, quantity: i64) -> LedgerResult<()> {
        let available = self.available_quantity(product_id)?;
        if available < quantity {
            let product = self.product(product_id)?;
            return Err(LedgerError::InsufficientStock {
                product_id,
                product_name: product.name.clone(),
                requested: quantity,
                available,
            });
        }
        Ok(())
    }

    /// Fails with `InactiveProduct` for deactivated products, otherwise as
    /// [`StockBook::ensure_available`]
    pub fn ensure_sellable(&self, product_id: Uuid, quantity: i64) -> LedgerResult<()> {
        let product = self.product(product_id)?;
        if !product.is_active {
            return Err(LedgerError::InactiveProduct {
                product_id,
                product_name: product.name.clone(),
            });
        }
        self.ensure_available(product_id, quantity)
    }

    /// Checks every positive delta against the stock left over by the
    /// others, so products sharing an ingredient cannot oversell it
    /// together. Returned stock (negative deltas) is counted first.
    pub fn ensure_increases_available(&self, deltas: &BTreeMap<Uuid, i64>) -> LedgerResult<()> {
        let mut scratch = self.clone();

        let returned: BTreeMap<Uuid, i64> = deltas
            .iter()
            .filter(|(_, delta)| **delta < 0)
            .map(|(id, delta)| (*id, *delta))
            .collect();
        let changes = scratch.stock_changes(&returned)?;
        scratch.apply(&changes)?;

        for (&product_id, &delta) in deltas.iter().filter(|(_, delta)| **delta > 0) {
            scratch.ensure_sellable(product_id, delta)?;
            scratch.deduct(product_id, delta)?;
        }
        Ok(())
    }

    /// Stock changes implied by selling `delta` more units of each product
    /// (negative deltas return stock). Does not modify the book.
    pub fn stock_changes(&self, deltas: &BTreeMap<Uuid, i64>) -> LedgerResult<StockChanges> {
        let mut changes = StockChanges::new();

        for (&product_id, &delta) in deltas {
            if delta == 0 {
                continue;
            }
            let product = self.product(product_id)?;
            let delta = Decimal::from(delta);

            if product.is_composite {
                for link in &product.ingredients {
                    self.product(link.ingredient_id)?;
                    *changes.entry(link.ingredient_id).or_insert(Decimal::ZERO) -=
                        delta * link.quantity;
                }
            } else {
                *changes.entry(product_id).or_insert(Decimal::ZERO) -= delta * product.unit_size;
            }
        }

        changes.retain(|_, change| !change.is_zero());
        Ok(changes)
    }

    /// Apply precomputed changes to the in-memory stock
    pub fn apply(&mut self, changes: &StockChanges) -> LedgerResult<()> {
        for product_id in changes.keys() {
            self.product(*product_id)?;
        }
        for (product_id, change) in changes {
            if let Some(product) = self.products.get_mut(product_id) {
                product.stock += *change;
            }
        }
        Ok(())
    }

    /// Move stock to match a change from `old` to `new` line items.
    /// No floor is enforced: stock may go negative.
    pub fn apply_items_delta(
        &mut self,
        old: &[OrderItem],
        new: &[OrderItem],
    ) -> LedgerResult<StockChanges> {
        let changes = self.stock_changes(&items_delta(old, new))?;
        self.apply(&changes)?;
        Ok(changes)
    }

    /// Deduct `quantity` units outside of any line item (write-offs)
    pub fn deduct(&mut self, product_id: Uuid, quantity: i64) -> LedgerResult<StockChanges> {
        let deltas = BTreeMap::from([(product_id, quantity)]);
        let changes = self.stock_changes(&deltas)?;
        self.apply(&changes)?;
        Ok(changes)
    }
}

fn ensure_active(order: &Order) -> LedgerResult<()> {
    if order.is_active() {
        Ok(())
    } else {
        Err(LedgerError::InvalidState(order.status))
    }
}

fn ensure_positive(quantity: i64) -> LedgerResult<()> {
    if quantity > 0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidQuantity(quantity))
    }
}

fn merged_quantity(current: i32, added: i32) -> LedgerResult<i32> {
    current
        .checked_add(added)
        .ok_or(LedgerError::QuantityTooLarge(i64::from(current) + i64::from(added)))
}

/// Add `quantity` units of a product to an active order.
///
/// An existing line for the product is merged in place and keeps its
/// snapshot price and name; otherwise a new line snapshots the catalog.
pub fn add_item_to_order(
    order: &mut Order,
    book: &mut StockBook,
    product_id: Uuid,
    quantity: i32,
) -> LedgerResult<StockChanges> {
    ensure_active(order)?;
    ensure_positive(i64::from(quantity))?;
    let position = order.item_position(product_id);
    let merged = match position {
        Some(index) => merged_quantity(order.order_items[index].quantity, quantity)?,
        None => quantity,
    };
    book.ensure_sellable(product_id, i64::from(quantity))?;

    let product = book.product(product_id)?;
    let added = OrderItem {
        product_id,
        product_name: product.name.clone(),
        quantity,
        price: product.price,
    };

    let changes = book.apply_items_delta(&[], std::slice::from_ref(&added))?;

    match position {
        Some(index) => order.order_items[index].quantity = merged,
        None => order.order_items.push(added),
    }
    order.recalculate_total();

    Ok(changes)
}

/// Remove the line at `index`, returning its quantity to stock.
///
/// Removing the last line cancels the order.
pub fn remove_item_from_order(
    order: &mut Order,
    book: &mut StockBook,
    index: usize,
    now: DateTime<Utc>,
) -> LedgerResult<(OrderItem, StockChanges)> {
    ensure_active(order)?;
    let len = order.order_items.len();
    if index >= len {
        return Err(LedgerError::InvalidIndex { index, len });
    }

    let removed = order.order_items[index].clone();
    let changes = book.apply_items_delta(std::slice::from_ref(&removed), &[])?;
    order.order_items.remove(index);

    if order.order_items.is_empty() {
        order.status = OrderStatus::Cancelled;
        order.comment = Some(EMPTIED_ORDER_COMMENT.to_string());
        order.closed_at = Some(now);
        order.total_amount = Decimal::ZERO;
    } else {
        order.recalculate_total();
    }

    Ok((removed, changes))
}

/// Build line items for a full edit. Products already on the order keep
/// their snapshot; new products snapshot the catalog. Duplicate requests for
/// one product collapse into a single line.
pub fn build_items(
    existing: &[OrderItem],
    requested: &[NewOrderItem],
    book: &StockBook,
) -> LedgerResult<Vec<OrderItem>> {
    let mut items: Vec<OrderItem> = Vec::with_capacity(requested.len());

    for req in requested {
        ensure_positive(i64::from(req.quantity))?;

        if let Some(line) = items.iter_mut().find(|i| i.product_id == req.product_id) {
            line.quantity = merged_quantity(line.quantity, req.quantity)?;
            continue;
        }

        let line = match existing.iter().find(|i| i.product_id == req.product_id) {
            Some(snapshot) => OrderItem {
                quantity: req.quantity,
                ..snapshot.clone()
            },
            None => {
                let product = book.product(req.product_id)?;
                OrderItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: req.quantity,
                    price: product.price,
                }
            }
        };
        items.push(line);
    }

    Ok(items)
}

/// Replace the items of an active order wholesale, moving stock by the
/// difference. Products whose quantity grows are checked for availability
/// of the increase, taken together, before anything changes.
pub fn replace_items(
    order: &mut Order,
    book: &mut StockBook,
    requested: &[NewOrderItem],
) -> LedgerResult<StockChanges> {
    ensure_active(order)?;
    let new_items = build_items(&order.order_items, requested, book)?;

    let deltas = items_delta(&order.order_items, &new_items);
    book.ensure_increases_available(&deltas)?;

    let changes = book.stock_changes(&deltas)?;
    book.apply(&changes)?;

    order.order_items = new_items;
    order.recalculate_total();
    Ok(changes)
}

/// Move an active order to a terminal status. Stock is untouched: it was
/// adjusted when the items were added.
pub fn close_order(
    order: &mut Order,
    outcome: OrderStatus,
    payment_method: Option<PaymentMethod>,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    if !order.status.can_transition_to(outcome) {
        return Err(LedgerError::InvalidState(order.status));
    }

    if outcome == OrderStatus::Completed {
        let method = payment_method.ok_or(LedgerError::PaymentMethodRequired)?;
        order.payment_method = Some(method);
    }

    order.status = outcome;
    order.closed_at = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientRequirement;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn simple(name: &str, price: &str, stock: &str, unit_size: &str) -> ProductStock {
        ProductStock {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: dec(price),
            is_composite: false,
            stock: dec(stock),
            unit_size: dec(unit_size),
            unit: "pcs".to_string(),
            is_active: true,
            ingredients: vec![],
        }
    }

    fn empty_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            guest_id: None,
            guest_name: "Anna".to_string(),
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

    #[test]
    fn delta_unions_both_sides_and_drops_zeroes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let line = |id, qty| OrderItem {
            product_id: id,
            product_name: String::new(),
            quantity: qty,
            price: Decimal::ONE,
        };

        let old = vec![line(a, 2), line(b, 1)];
        let new = vec![line(a, 2), line(c, 3)];
        let delta = items_delta(&old, &new);

        assert_eq!(delta.get(&a), None);
        assert_eq!(delta.get(&b), Some(&-1));
        assert_eq!(delta.get(&c), Some(&3));
    }

    #[test]
    fn merging_keeps_first_snapshot_price() {
        let mut beer = simple("Beer", "100", "10", "1");
        let beer_id = beer.id;
        let mut book = StockBook::new([beer.clone()]);
        let mut order = empty_order();

        add_item_to_order(&mut order, &mut book, beer_id, 1).unwrap();

        beer.price = dec("150");
        beer.stock = book.stock(beer_id).unwrap();
        book.insert(beer);
        add_item_to_order(&mut order, &mut book, beer_id, 2).unwrap();

        assert_eq!(order.order_items.len(), 1);
        assert_eq!(order.order_items[0].quantity, 3);
        assert_eq!(order.order_items[0].price, dec("100"));
        assert_eq!(order.total_amount, dec("300"));
        assert_eq!(book.stock(beer_id), Some(dec("7")));
    }

    #[test]
    fn insufficient_stock_reports_available_units() {
        let wine = simple("Wine", "300", "0.5", "0.15");
        let wine_id = wine.id;
        let mut book = StockBook::new([wine]);
        let mut order = empty_order();

        let err = add_item_to_order(&mut order, &mut book, wine_id, 4).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product_id: wine_id,
                product_name: "Wine".to_string(),
                requested: 4,
                available: 3,
            }
        );
        assert!(order.order_items.is_empty());
        assert_eq!(book.stock(wine_id), Some(dec("0.5")));
    }

    #[test]
    fn closed_orders_reject_mutation() {
        let beer = simple("Beer", "100", "10", "1");
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = empty_order();
        add_item_to_order(&mut order, &mut book, beer_id, 1).unwrap();
        close_order(&mut order, OrderStatus::Completed, Some(PaymentMethod::Card), Utc::now())
            .unwrap();

        assert_eq!(
            add_item_to_order(&mut order, &mut book, beer_id, 1),
            Err(LedgerError::InvalidState(OrderStatus::Completed))
        );
        assert!(remove_item_from_order(&mut order, &mut book, 0, Utc::now()).is_err());
        assert_eq!(book.stock(beer_id), Some(dec("9")));
    }

    #[test]
    fn completing_requires_payment_method() {
        let mut order = empty_order();
        assert_eq!(
            close_order(&mut order, OrderStatus::Completed, None, Utc::now()),
            Err(LedgerError::PaymentMethodRequired)
        );
        assert!(order.is_active());

        close_order(&mut order, OrderStatus::Cancelled, None, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.closed_at.is_some());
        assert_eq!(order.payment_method, None);
    }

    #[test]
    fn composite_ingredient_must_be_loaded() {
        let mut mojito = simple("Mojito", "450", "0", "1");
        mojito.is_composite = true;
        mojito.ingredients.push(IngredientRequirement {
            ingredient_id: Uuid::new_v4(),
            quantity: dec("0.05"),
        });
        let mojito_id = mojito.id;
        let book = StockBook::new([mojito]);

        assert!(matches!(
            book.available_quantity(mojito_id),
            Err(LedgerError::UnknownProduct(_))
        ));
    }

    #[test]
    fn build_items_collapses_duplicates() {
        let beer = simple("Beer", "100", "10", "1");
        let beer_id = beer.id;
        let book = StockBook::new([beer]);
        let requested = vec![
            NewOrderItem { product_id: beer_id, quantity: 1 },
            NewOrderItem { product_id: beer_id, quantity: 2 },
        ];

        let items = build_items(&[], &requested, &book).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn duplicate_lines_beyond_i32_are_rejected() {
        let beer = simple("Beer", "100", "10", "1");
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = empty_order();
        let requested = vec![
            NewOrderItem { product_id: beer_id, quantity: i32::MAX },
            NewOrderItem { product_id: beer_id, quantity: i32::MAX },
        ];

        assert_eq!(
            replace_items(&mut order, &mut book, &requested),
            Err(LedgerError::QuantityTooLarge(2 * i64::from(i32::MAX)))
        );
        assert!(order.order_items.is_empty());
        assert_eq!(book.stock(beer_id), Some(dec("10")));
    }

    #[test]
    fn merging_into_a_full_line_is_rejected() {
        let beer = simple("Beer", "1", "0", "0");
        let beer_id = beer.id;
        let mut book = StockBook::new([beer]);
        let mut order = empty_order();
        order.order_items.push(OrderItem {
            product_id: beer_id,
            product_name: "Beer".to_string(),
            quantity: i32::MAX,
            price: Decimal::ONE,
        });

        assert!(matches!(
            add_item_to_order(&mut order, &mut book, beer_id, 1),
            Err(LedgerError::QuantityTooLarge(_))
        ));
        assert_eq!(order.order_items[0].quantity, i32::MAX);
    }

    #[test]
    fn inactive_products_cannot_be_added_but_can_be_returned() {
        let beer = simple("Beer", "100", "10", "1");
        let beer_id = beer.id;
        let mut book = StockBook::new([beer.clone()]);
        let mut order = empty_order();
        add_item_to_order(&mut order, &mut book, beer_id, 2).unwrap();

        book.insert(ProductStock {
            is_active: false,
            stock: dec("8"),
            ..beer
        });
        assert!(matches!(
            add_item_to_order(&mut order, &mut book, beer_id, 1),
            Err(LedgerError::InactiveProduct { .. })
        ));
        assert!(matches!(
            replace_items(&mut order, &mut book, &[NewOrderItem { product_id: beer_id, quantity: 3 }]),
            Err(LedgerError::InactiveProduct { .. })
        ));

        replace_items(&mut order, &mut book, &[NewOrderItem { product_id: beer_id, quantity: 1 }])
            .unwrap();
        assert_eq!(book.stock(beer_id), Some(dec("9")));
    }

    #[test]
    fn deduct_goes_through_ingredients() {
        let lime = simple("Lime", "0", "3", "1");
        let mut tonic = simple("Lime tonic", "200", "0", "1");
        tonic.is_composite = true;
        tonic.ingredients.push(IngredientRequirement {
            ingredient_id: lime.id,
            quantity: dec("0.5"),
        });
        let (lime_id, tonic_id) = (lime.id, tonic.id);
        let mut book = StockBook::new([lime, tonic]);

        let changes = book.deduct(tonic_id, 2).unwrap();
        assert_eq!(changes.get(&lime_id), Some(&dec("-1.0")));
        assert_eq!(book.stock(lime_id), Some(dec("2")));
    }
}
