//! Order lifecycle tests
//!
//! Tests for order state transitions including:
//! - Active orders are the only mutable ones
//! - Closing never touches stock
//! - Guest statistics on completion
//! - Seating placeholders are never linked to guests

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::ledger::{add_item_to_order, close_order, replace_items, LedgerError, StockBook};
use shared::{
    is_placeholder_guest_name, DateRange, GuestStats, NewOrderItem, Order, OrderStatus,
    PaymentMethod, ProductStock,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn beer(stock: &str) -> ProductStock {
    ProductStock {
        id: Uuid::new_v4(),
        name: "Beer".to_string(),
        price: dec("150"),
        is_composite: false,
        stock: dec(stock),
        unit_size: Decimal::ONE,
        unit: "bottle".to_string(),
        is_active: true,
        ingredients: vec![],
    }
}

fn active_order() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        guest_id: Some(Uuid::new_v4()),
        guest_name: "Ivan".to_string(),
        user_id: Uuid::new_v4(),
        shift_id: Some(Uuid::new_v4()),
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

fn placeholders() -> Vec<String> {
    ["Стол", "Бар", "Улица", "Table", "Bar", "Street"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test status transitions
    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;

        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        for terminal in [Completed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Active, Completed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Active.can_transition_to(Active));
    }

    /// Test status and payment method string forms
    #[test]
    fn test_string_forms() {
        for status in [OrderStatus::Active, OrderStatus::Completed, OrderStatus::Cancelled] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        for method in [PaymentMethod::Cash, PaymentMethod::Card, PaymentMethod::Transfer] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(OrderStatus::parse("paid"), None);
        assert_eq!(PaymentMethod::parse("crypto"), None);
    }

    /// Completing keeps stock where the sale left it
    #[test]
    fn test_complete_does_not_touch_stock() {
        let product = beer("10");
        let id = product.id;
        let mut book = StockBook::new([product]);
        let mut order = active_order();

        add_item_to_order(&mut order, &mut book, id, 2).unwrap();
        close_order(&mut order, OrderStatus::Completed, Some(PaymentMethod::Cash), Utc::now())
            .unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.payment_method, Some(PaymentMethod::Cash));
        assert!(order.closed_at.is_some());
        assert_eq!(book.stock(id), Some(dec("8")));
        assert_eq!(order.total_amount, dec("300"));
    }

    /// Cancelling keeps the deduction
    #[test]
    fn test_cancel_does_not_return_stock() {
        let product = beer("10");
        let id = product.id;
        let mut book = StockBook::new([product]);
        let mut order = active_order();

        add_item_to_order(&mut order, &mut book, id, 3).unwrap();
        close_order(&mut order, OrderStatus::Cancelled, None, Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(book.stock(id), Some(dec("7")));
    }

    /// Closing twice is an invalid state
    #[test]
    fn test_close_twice_rejected() {
        let mut order = active_order();
        close_order(&mut order, OrderStatus::Cancelled, None, Utc::now()).unwrap();
        let closed_at = order.closed_at;

        assert_eq!(
            close_order(&mut order, OrderStatus::Completed, Some(PaymentMethod::Card), Utc::now()),
            Err(LedgerError::InvalidState(OrderStatus::Cancelled))
        );
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.closed_at, closed_at);
        assert_eq!(order.payment_method, None);
    }

    /// Full edits are rejected once closed
    #[test]
    fn test_replace_items_on_completed_order() {
        let product = beer("10");
        let id = product.id;
        let mut book = StockBook::new([product]);
        let mut order = active_order();
        add_item_to_order(&mut order, &mut book, id, 1).unwrap();
        close_order(&mut order, OrderStatus::Completed, Some(PaymentMethod::Transfer), Utc::now())
            .unwrap();

        let err = replace_items(
            &mut order,
            &mut book,
            &[NewOrderItem { product_id: id, quantity: 5 }],
        )
        .unwrap_err();

        assert_eq!(err, LedgerError::InvalidState(OrderStatus::Completed));
        assert_eq!(order.order_items[0].quantity, 1);
        assert_eq!(book.stock(id), Some(dec("9")));
    }

    /// Guest statistics after three visits
    #[test]
    fn test_guest_statistics() {
        let mut stats = GuestStats::default();
        for amount in ["450", "900", "300"] {
            stats.record_visit(dec(amount));
        }

        assert_eq!(stats.visit_count, 3);
        assert_eq!(stats.total_orders_amount, dec("1650"));
        assert_eq!(stats.average_check, dec("550"));
    }

    /// Seating placeholders, with or without a table number
    #[test]
    fn test_placeholder_guest_names() {
        let names = placeholders();

        for name in ["Стол", "стол 5", "Bar", "TABLE 12", "table #3", "  ", ""] {
            assert!(is_placeholder_guest_name(name, &names), "{:?}", name);
        }
        for name in ["Иван", "Barbara", "Tablet", "Anna 2nd"] {
            assert!(!is_placeholder_guest_name(name, &names), "{:?}", name);
        }
    }

    /// Default report window
    #[test]
    fn test_date_range_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let range = DateRange::resolve(None, None, today).unwrap();

        assert_eq!(range.end, today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(range.contains(today));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));

        let reversed = DateRange::resolve(Some(today), NaiveDate::from_ymd_opt(2024, 3, 1), today);
        assert!(reversed.is_none());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating order amounts (0.00 to 50000.00)
    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=5_000_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for generating payment methods
    fn payment_strategy() -> impl Strategy<Value = PaymentMethod> {
        prop_oneof![
            Just(PaymentMethod::Cash),
            Just(PaymentMethod::Card),
            Just(PaymentMethod::Transfer),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Total spent is the sum of visits; average is within a cent of total / visits
        #[test]
        fn prop_guest_statistics_accumulate(amounts in prop::collection::vec(amount_strategy(), 1..20)) {
            let mut stats = GuestStats::default();
            for amount in &amounts {
                stats.record_visit(*amount);
            }

            let total: Decimal = amounts.iter().copied().sum();
            prop_assert_eq!(stats.visit_count as usize, amounts.len());
            prop_assert_eq!(stats.total_orders_amount, total);

            let exact = total / Decimal::from(amounts.len() as i64);
            prop_assert!((stats.average_check - exact).abs() <= dec("0.005"));
        }

        /// Completing with any payment method freezes the order
        #[test]
        fn prop_completed_orders_reject_additions(
            method in payment_strategy(),
            quantity in 1i32..=5,
        ) {
            let product = beer("100");
            let id = product.id;
            let mut book = StockBook::new([product]);
            let mut order = active_order();
            add_item_to_order(&mut order, &mut book, id, quantity).unwrap();
            close_order(&mut order, OrderStatus::Completed, Some(method), Utc::now()).unwrap();

            let total = order.total_amount;
            let stock = book.stock(id);
            let err = add_item_to_order(&mut order, &mut book, id, 1).unwrap_err();

            prop_assert_eq!(err, LedgerError::InvalidState(OrderStatus::Completed));
            prop_assert_eq!(order.total_amount, total);
            prop_assert_eq!(book.stock(id), stock);
            prop_assert_eq!(order.payment_method, Some(method));
        }

        /// A placeholder followed by any table number is still a placeholder
        #[test]
        fn prop_numbered_placeholders(index in 0usize..6, table in 1u32..=99) {
            let names = placeholders();
            let name = format!("{} {}", names[index], table);
            prop_assert!(is_placeholder_guest_name(&name, &names));
        }
    }
}
