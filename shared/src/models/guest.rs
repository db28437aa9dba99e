//! Guest models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Running visit statistics kept on a guest record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct GuestStats {
    pub visit_count: i32,
    pub total_orders_amount: Decimal,
    pub average_check: Decimal,
}

impl GuestStats {
    /// Account for one completed order of `amount`
    pub fn record_visit(&mut self, amount: Decimal) {
        self.visit_count += 1;
        self.total_orders_amount += amount;
        self.average_check =
            (self.total_orders_amount / Decimal::from(self.visit_count)).round_dp(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_check_follows_visits() {
        let mut stats = GuestStats::default();
        stats.record_visit(Decimal::from(300));
        assert_eq!(stats.visit_count, 1);
        assert_eq!(stats.average_check, Decimal::from(300));

        stats.record_visit(Decimal::from(100));
        assert_eq!(stats.visit_count, 2);
        assert_eq!(stats.total_orders_amount, Decimal::from(400));
        assert_eq!(stats.average_check, Decimal::from(200));
    }

    #[test]
    fn average_check_is_rounded_to_cents() {
        let mut stats = GuestStats::default();
        for amount in [100, 100, 101] {
            stats.record_visit(Decimal::from(amount));
        }
        assert_eq!(stats.average_check.to_string(), "100.33");
    }
}
