//! Guest management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{is_placeholder_guest_name, normalize_guest_name, GuestStats};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Guest service
#[derive(Clone)]
pub struct GuestService {
    db: PgPool,
}

/// A guest record with running visit statistics
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Guest {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub visit_count: i32,
    pub total_orders_amount: Decimal,
    pub average_check: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a guest
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGuestInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a guest
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGuestInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Guest link resolved for an order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGuest {
    pub guest_id: Option<Uuid>,
    pub guest_name: String,
}

const GUEST_COLUMNS: &str = "id, name, phone, notes, visit_count, total_orders_amount, \
                             average_check, created_at, updated_at";

fn blank_name() -> AppError {
    AppError::Validation {
        field: "name".to_string(),
        message: "Guest name cannot be blank".to_string(),
        message_ru: "Имя гостя не может быть пустым".to_string(),
    }
}

impl GuestService {
    /// Create a new GuestService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a guest
    pub async fn create_guest(&self, input: CreateGuestInput) -> AppResult<Guest> {
        input.validate()?;
        let name = normalize_guest_name(&input.name);
        if name.is_empty() {
            return Err(blank_name());
        }

        let guest = sqlx::query_as::<_, Guest>(&format!(
            "INSERT INTO guests (name, phone, notes) VALUES ($1, $2, $3) RETURNING {}",
            GUEST_COLUMNS
        ))
        .bind(&name)
        .bind(&input.phone)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(guest_id = %guest.id, "Guest created");
        Ok(guest)
    }

    /// Get a guest by ID
    pub async fn get_guest(&self, guest_id: Uuid) -> AppResult<Guest> {
        sqlx::query_as::<_, Guest>(&format!(
            "SELECT {} FROM guests WHERE id = $1",
            GUEST_COLUMNS
        ))
        .bind(guest_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Guest".to_string()))
    }

    /// List guests, optionally filtered by a name or phone fragment
    pub async fn list_guests(&self, search: Option<&str>) -> AppResult<Vec<Guest>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let guests = sqlx::query_as::<_, Guest>(&format!(
            r#"
            SELECT {}
            FROM guests
            WHERE $1::text IS NULL OR LOWER(name) LIKE $1 OR phone LIKE $1
            ORDER BY visit_count DESC, name
            "#,
            GUEST_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(guests)
    }

    /// Update a guest's contact details. Statistics are only changed by
    /// completing orders.
    pub async fn update_guest(&self, guest_id: Uuid, input: UpdateGuestInput) -> AppResult<Guest> {
        input.validate()?;
        let existing = self.get_guest(guest_id).await?;

        let name = match input.name {
            Some(name) => {
                let name = normalize_guest_name(&name);
                if name.is_empty() {
                    return Err(blank_name());
                }
                name
            }
            None => existing.name,
        };
        let phone = input.phone.or(existing.phone);
        let notes = input.notes.or(existing.notes);

        let guest = sqlx::query_as::<_, Guest>(&format!(
            r#"
            UPDATE guests SET name = $1, phone = $2, notes = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            GUEST_COLUMNS
        ))
        .bind(&name)
        .bind(&phone)
        .bind(&notes)
        .bind(guest_id)
        .fetch_one(&self.db)
        .await?;

        Ok(guest)
    }

    /// Decide which guest record, if any, an order belongs to.
    ///
    /// An explicit `guest_id` wins. Otherwise a name that is not a seating
    /// placeholder links to the guest with exactly that name (ignoring case)
    /// when there is exactly one. No guest record is ever created here.
    pub async fn resolve_for_order(
        conn: &mut PgConnection,
        guest_id: Option<Uuid>,
        guest_name: Option<&str>,
        placeholders: &[String],
    ) -> AppResult<ResolvedGuest> {
        let name = guest_name.map(normalize_guest_name).unwrap_or_default();

        if let Some(guest_id) = guest_id {
            let stored_name =
                sqlx::query_scalar::<_, String>("SELECT name FROM guests WHERE id = $1")
                    .bind(guest_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Guest".to_string()))?;
            return Ok(ResolvedGuest {
                guest_id: Some(guest_id),
                guest_name: if name.is_empty() { stored_name } else { name },
            });
        }

        if is_placeholder_guest_name(&name, placeholders) {
            return Ok(ResolvedGuest {
                guest_id: None,
                guest_name: name,
            });
        }

        let matches = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM guests WHERE LOWER(name) = LOWER($1) LIMIT 2",
        )
        .bind(&name)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ResolvedGuest {
            guest_id: match matches.as_slice() {
                [only] => Some(*only),
                _ => None,
            },
            guest_name: name,
        })
    }

    /// Account for a completed order on the guest's running statistics
    pub async fn record_visit(
        conn: &mut PgConnection,
        guest_id: Uuid,
        amount: Decimal,
    ) -> AppResult<GuestStats> {
        let row = sqlx::query_as::<_, (i32, Decimal, Decimal)>(
            r#"
            SELECT visit_count, total_orders_amount, average_check
            FROM guests WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(guest_id)
        .fetch_optional(&mut *conn)
        .await?;

        // The guest may have been deleted since the order was opened
        let Some((visit_count, total_orders_amount, average_check)) = row else {
            tracing::warn!(%guest_id, "Completed order references a missing guest");
            return Ok(GuestStats::default());
        };

        let mut stats = GuestStats {
            visit_count,
            total_orders_amount,
            average_check,
        };
        stats.record_visit(amount);

        sqlx::query(
            r#"
            UPDATE guests
            SET visit_count = $1, total_orders_amount = $2, average_check = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(stats.visit_count)
        .bind(stats.total_orders_amount)
        .bind(stats.average_check)
        .bind(guest_id)
        .execute(&mut *conn)
        .await?;

        Ok(stats)
    }
}
