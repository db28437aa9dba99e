//! Bar shift service: opening, closing and shift reports

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{OrderStatus, PaymentMethod};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Shift service
#[derive(Clone)]
pub struct ShiftService {
    db: PgPool,
}

/// Shift record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_cash: Decimal,
    pub closing_cash: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for opening a shift
#[derive(Debug, Deserialize, Validate)]
pub struct OpenShiftInput {
    pub opening_cash: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Input for closing a shift
#[derive(Debug, Deserialize, Validate)]
pub struct CloseShiftInput {
    pub closing_cash: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Revenue of one payment method
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentBreakdown {
    pub payment_method: String,
    pub orders: i64,
    pub revenue: Decimal,
}

/// Shift report
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSummary {
    pub shift: Shift,
    pub active_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub revenue: Decimal,
    pub by_payment_method: Vec<PaymentBreakdown>,
    pub write_off_cost: Decimal,
    /// Opening cash plus cash revenue
    pub expected_cash: Decimal,
}

const SHIFT_COLUMNS: &str = "id, user_id, opened_at, closed_at, opening_cash, closing_cash, notes";

fn shift_already_open() -> AppError {
    AppError::Conflict {
        resource: "shift".to_string(),
        message: "A shift is already open".to_string(),
        message_ru: "Смена уже открыта".to_string(),
    }
}

impl ShiftService {
    /// Create a new ShiftService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a shift. Only one shift may be open at a time.
    pub async fn open_shift(&self, user_id: Uuid, input: OpenShiftInput) -> AppResult<Shift> {
        input.validate()?;
        let opening_cash = input.opening_cash.unwrap_or(Decimal::ZERO);
        if opening_cash < Decimal::ZERO {
            return Err(AppError::invalid_field("opening_cash", "Cash cannot be negative"));
        }

        if self.current_shift().await?.is_some() {
            return Err(shift_already_open());
        }

        let shift = sqlx::query_as::<_, Shift>(&format!(
            "INSERT INTO shifts (user_id, opening_cash, notes) VALUES ($1, $2, $3) RETURNING {}",
            SHIFT_COLUMNS
        ))
        .bind(user_id)
        .bind(opening_cash)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            // Lost a race against another open
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => shift_already_open(),
            _ => AppError::DatabaseError(e),
        })?;

        tracing::info!(shift_id = %shift.id, %user_id, "Shift opened");
        Ok(shift)
    }

    /// Close an open shift
    pub async fn close_shift(&self, shift_id: Uuid, input: CloseShiftInput) -> AppResult<Shift> {
        input.validate()?;
        if input.closing_cash < Decimal::ZERO {
            return Err(AppError::invalid_field("closing_cash", "Cash cannot be negative"));
        }

        let existing = self.get_shift(shift_id).await?;
        if existing.closed_at.is_some() {
            return Err(AppError::InvalidState("shift is already closed".to_string()));
        }

        let shift = sqlx::query_as::<_, Shift>(&format!(
            r#"
            UPDATE shifts
            SET closed_at = NOW(), closing_cash = $1, notes = COALESCE($2, notes)
            WHERE id = $3 AND closed_at IS NULL
            RETURNING {}
            "#,
            SHIFT_COLUMNS
        ))
        .bind(input.closing_cash)
        .bind(&input.notes)
        .bind(shift_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::InvalidState("shift is already closed".to_string()))?;

        let active_orders = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE shift_id = $1 AND status = $2",
        )
        .bind(shift_id)
        .bind(OrderStatus::Active.as_str())
        .fetch_one(&self.db)
        .await?;
        if active_orders > 0 {
            tracing::warn!(%shift_id, active_orders, "Shift closed with active orders");
        }

        tracing::info!(%shift_id, closing_cash = %input.closing_cash, "Shift closed");
        Ok(shift)
    }

    /// The currently open shift, if any
    pub async fn current_shift(&self) -> AppResult<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {} FROM shifts WHERE closed_at IS NULL",
            SHIFT_COLUMNS
        ))
        .fetch_optional(&self.db)
        .await?;
        Ok(shift)
    }

    /// Get a shift by ID
    pub async fn get_shift(&self, shift_id: Uuid) -> AppResult<Shift> {
        sqlx::query_as::<_, Shift>(&format!("SELECT {} FROM shifts WHERE id = $1", SHIFT_COLUMNS))
            .bind(shift_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Shift".to_string()))
    }

    /// Most recent shifts first
    pub async fn list_shifts(&self, limit: i64) -> AppResult<Vec<Shift>> {
        let shifts = sqlx::query_as::<_, Shift>(&format!(
            "SELECT {} FROM shifts ORDER BY opened_at DESC LIMIT $1",
            SHIFT_COLUMNS
        ))
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.db)
        .await?;
        Ok(shifts)
    }

    /// Order counts, revenue and write-off cost of a shift
    pub async fn shift_summary(&self, shift_id: Uuid) -> AppResult<ShiftSummary> {
        let shift = self.get_shift(shift_id).await?;

        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM orders WHERE shift_id = $1 GROUP BY status",
        )
        .bind(shift_id)
        .fetch_all(&self.db)
        .await?;
        let count_of = |status: OrderStatus| {
            counts
                .iter()
                .find(|(s, _)| s == status.as_str())
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        let by_payment_method = sqlx::query_as::<_, PaymentBreakdown>(
            r#"
            SELECT payment_method, COUNT(*) AS orders, COALESCE(SUM(total_amount), 0) AS revenue
            FROM orders
            WHERE shift_id = $1 AND status = $2 AND payment_method IS NOT NULL
            GROUP BY payment_method
            ORDER BY payment_method
            "#,
        )
        .bind(shift_id)
        .bind(OrderStatus::Completed.as_str())
        .fetch_all(&self.db)
        .await?;

        let write_off_cost = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(w.cost_amount), 0)
            FROM write_offs w
            JOIN orders o ON o.id = w.order_id
            WHERE o.shift_id = $1
            "#,
        )
        .bind(shift_id)
        .fetch_one(&self.db)
        .await?;

        let revenue: Decimal = by_payment_method.iter().map(|p| p.revenue).sum();
        let cash_revenue: Decimal = by_payment_method
            .iter()
            .filter(|p| p.payment_method == PaymentMethod::Cash.as_str())
            .map(|p| p.revenue)
            .sum();

        Ok(ShiftSummary {
            active_orders: count_of(OrderStatus::Active),
            completed_orders: count_of(OrderStatus::Completed),
            cancelled_orders: count_of(OrderStatus::Cancelled),
            revenue,
            expected_cash: shift.opening_cash + cash_revenue,
            by_payment_method,
            write_off_cost,
            shift,
        })
    }
}
