//! Sales analytics over closed orders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{DateRange, OrderStatus};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Analytics service
#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
}

/// Sales totals for a date range
#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub revenue: Decimal,
    pub average_check: Decimal,
    pub write_off_cost: Decimal,
}

/// Sales of one product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// Revenue of one payment method
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentMethodStats {
    pub payment_method: String,
    pub orders: i64,
    pub revenue: Decimal,
}

/// One completed order as exported to CSV
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderExportRow {
    pub order_id: Uuid,
    pub closed_at: DateTime<Utc>,
    pub guest_name: String,
    pub items: i64,
    pub total_amount: Decimal,
    pub payment_method: String,
}

/// How top products are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopProductsBy {
    #[default]
    Quantity,
    Revenue,
}

impl AnalyticsService {
    /// Create a new AnalyticsService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Order counts, revenue, average check and write-off cost for a range.
    /// Orders are attributed to the day they were closed.
    pub async fn sales_summary(&self, range: DateRange) -> AppResult<SalesSummary> {
        let (completed_orders, cancelled_orders, revenue) =
            sqlx::query_as::<_, (i64, i64, Decimal)>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = $3),
                    COUNT(*) FILTER (WHERE status = $4),
                    COALESCE(SUM(total_amount) FILTER (WHERE status = $3), 0)
                FROM orders
                WHERE closed_at::date BETWEEN $1 AND $2
                "#,
            )
            .bind(range.start)
            .bind(range.end)
            .bind(OrderStatus::Completed.as_str())
            .bind(OrderStatus::Cancelled.as_str())
            .fetch_one(&self.db)
            .await?;

        let write_off_cost = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(cost_amount), 0) FROM write_offs WHERE created_at::date BETWEEN $1 AND $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.db)
        .await?;

        let average_check = if completed_orders > 0 {
            (revenue / Decimal::from(completed_orders)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(SalesSummary {
            start: range.start,
            end: range.end,
            completed_orders,
            cancelled_orders,
            revenue,
            average_check,
            write_off_cost,
        })
    }

    /// Best selling products from completed orders
    pub async fn top_products(
        &self,
        range: DateRange,
        by: TopProductsBy,
        limit: i64,
    ) -> AppResult<Vec<TopProduct>> {
        let order_by = match by {
            TopProductsBy::Quantity => "quantity DESC, revenue DESC",
            TopProductsBy::Revenue => "revenue DESC, quantity DESC",
        };

        let products = sqlx::query_as::<_, TopProduct>(&format!(
            r#"
            SELECT item.product_id,
                   MAX(item.product_name) AS product_name,
                   SUM(item.quantity)::bigint AS quantity,
                   SUM(item.quantity * item.price) AS revenue
            FROM orders o
            CROSS JOIN LATERAL jsonb_to_recordset(o.order_items)
                AS item(product_id uuid, product_name text, quantity int, price numeric)
            WHERE o.status = $1 AND o.closed_at::date BETWEEN $2 AND $3
            GROUP BY item.product_id
            ORDER BY {}
            LIMIT $4
            "#,
            order_by
        ))
        .bind(OrderStatus::Completed.as_str())
        .bind(range.start)
        .bind(range.end)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Revenue split by payment method
    pub async fn payment_methods(&self, range: DateRange) -> AppResult<Vec<PaymentMethodStats>> {
        let stats = sqlx::query_as::<_, PaymentMethodStats>(
            r#"
            SELECT payment_method, COUNT(*) AS orders, SUM(total_amount) AS revenue
            FROM orders
            WHERE status = $1 AND payment_method IS NOT NULL
              AND closed_at::date BETWEEN $2 AND $3
            GROUP BY payment_method
            ORDER BY revenue DESC
            "#,
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(stats)
    }

    /// Completed orders of a range, oldest first, for export
    pub async fn completed_orders(&self, range: DateRange) -> AppResult<Vec<OrderExportRow>> {
        let rows = sqlx::query_as::<_, OrderExportRow>(
            r#"
            SELECT id AS order_id, closed_at, guest_name,
                   COALESCE((SELECT SUM((i->>'quantity')::int)
                             FROM jsonb_array_elements(order_items) i), 0)::bigint AS items,
                   total_amount, payment_method
            FROM orders
            WHERE status = $1 AND closed_at::date BETWEEN $2 AND $3
            ORDER BY closed_at
            "#,
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
