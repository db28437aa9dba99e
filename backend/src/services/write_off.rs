//! Write-off service
//!
//! A write-off deducts stock for something spilled, comped or broken while
//! serving an order. It goes through the same ledger as line items, so a
//! composite write-off deducts its ingredients. There is no availability
//! check: the loss already happened.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::DateRange;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::StockLedger;

/// Write-off service
#[derive(Clone)]
pub struct WriteOffService {
    db: PgPool,
}

/// Write-off record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WriteOff {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub reason: String,
    pub cost_amount: Decimal,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a write-off
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWriteOffInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Date range query for write-offs
#[derive(Debug, Deserialize)]
pub struct WriteOffQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const WRITE_OFF_COLUMNS: &str =
    "id, order_id, product_id, product_name, quantity, reason, cost_amount, user_id, created_at";

impl WriteOffService {
    /// Create a new WriteOffService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a write-off against an order and deduct its stock
    pub async fn create_write_off(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        input: CreateWriteOffInput,
    ) -> AppResult<WriteOff> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await?;
        if !order_exists {
            return Err(AppError::NotFound("Order".to_string()));
        }

        let mut book = StockLedger::lock_book(&mut *tx, &[input.product_id]).await?;
        let (product_name, cost_price) = sqlx::query_as::<_, (String, Decimal)>(
            "SELECT name, cost_price FROM products WHERE id = $1",
        )
        .bind(input.product_id)
        .fetch_one(&mut *tx)
        .await?;

        let changes = book.deduct(input.product_id, i64::from(input.quantity))?;
        StockLedger::persist(&mut *tx, &changes).await?;

        let write_off = sqlx::query_as::<_, WriteOff>(&format!(
            r#"
            INSERT INTO write_offs (order_id, product_id, product_name, quantity, reason,
                                    cost_amount, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            WRITE_OFF_COLUMNS
        ))
        .bind(order_id)
        .bind(input.product_id)
        .bind(&product_name)
        .bind(input.quantity)
        .bind(input.reason.trim())
        .bind(cost_price * Decimal::from(input.quantity))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off.id,
            %order_id,
            product = %product_name,
            quantity = input.quantity,
            "Stock written off"
        );
        Ok(write_off)
    }

    /// Write-offs recorded against an order
    pub async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<WriteOff>> {
        let write_offs = sqlx::query_as::<_, WriteOff>(&format!(
            "SELECT {} FROM write_offs WHERE order_id = $1 ORDER BY created_at",
            WRITE_OFF_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(write_offs)
    }

    /// Write-offs recorded within a date range, newest first
    pub async fn list_by_range(&self, range: DateRange) -> AppResult<Vec<WriteOff>> {
        let write_offs = sqlx::query_as::<_, WriteOff>(&format!(
            r#"
            SELECT {}
            FROM write_offs
            WHERE created_at::date BETWEEN $1 AND $2
            ORDER BY created_at DESC
            "#,
            WRITE_OFF_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(write_offs)
    }
}
