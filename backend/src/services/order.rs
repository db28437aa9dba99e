//! Order service: order lifecycle and line item edits
//!
//! Every mutation runs in one transaction that locks the order row, locks
//! the touched product rows through [`StockLedger`], applies the ledger
//! operation in memory and writes stock and order back before committing.
//! Any error drops the transaction and leaves stock and order untouched.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::ledger::{self, StockChanges};
use shared::{
    NewOrderItem, Order, OrderItem, OrderStatus, PaginatedResponse, Pagination, PaginationMeta,
    PaymentMethod,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::guest::GuestService;
use crate::services::ledger::StockLedger;

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    placeholder_names: Vec<String>,
}

/// Order row as stored
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    guest_id: Option<Uuid>,
    guest_name: String,
    user_id: Uuid,
    shift_id: Option<Uuid>,
    order_items: Json<Vec<OrderItem>>,
    total_amount: Decimal,
    status: String,
    payment_method: Option<String>,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown order status '{}'", row.status)))?;
        let payment_method = row
            .payment_method
            .as_deref()
            .map(|m| {
                PaymentMethod::parse(m)
                    .ok_or_else(|| AppError::Internal(format!("Unknown payment method '{}'", m)))
            })
            .transpose()?;

        Ok(Order {
            id: row.id,
            guest_id: row.guest_id,
            guest_name: row.guest_name,
            user_id: row.user_id,
            shift_id: row.shift_id,
            order_items: row.order_items.0,
            total_amount: row.total_amount,
            status,
            payment_method,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
            closed_at: row.closed_at,
        })
    }
}

/// Input for opening an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub guest_id: Option<Uuid>,
    #[validate(length(max = 120))]
    pub guest_name: Option<String>,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<NewOrderItem>,
}

/// Input for a full order edit
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub guest_id: Option<Uuid>,
    #[validate(length(max = 120))]
    pub guest_name: Option<String>,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
    /// Replaces all line items when present
    pub items: Option<Vec<NewOrderItem>>,
}

/// Input for adding a single item
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Input for completing an order
#[derive(Debug, Deserialize)]
pub struct CompleteOrderInput {
    pub payment_method: PaymentMethod,
}

/// Input for cancelling an order
#[derive(Debug, Deserialize, Validate)]
pub struct CancelOrderInput {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Filters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub guest_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

const ORDER_COLUMNS: &str = "id, guest_id, guest_name, user_id, shift_id, order_items, \
                             total_amount, status, payment_method, comment, created_at, \
                             updated_at, closed_at";

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            placeholder_names: config.guests.placeholder_names.clone(),
        }
    }

    /// Open an order with its initial items, deducting their stock
    pub async fn create_order(&self, user_id: Uuid, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let guest = GuestService::resolve_for_order(
            &mut *tx,
            input.guest_id,
            input.guest_name.as_deref(),
            &self.placeholder_names,
        )
        .await?;

        let shift_id =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM shifts WHERE closed_at IS NULL")
                .fetch_optional(&mut *tx)
                .await?;

        let product_ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        let mut book = StockLedger::lock_book(&mut *tx, &product_ids).await?;

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            guest_id: guest.guest_id,
            guest_name: guest.guest_name,
            user_id,
            shift_id,
            order_items: Vec::new(),
            total_amount: Decimal::ZERO,
            status: OrderStatus::Active,
            payment_method: None,
            comment: input.comment,
            created_at: now,
            updated_at: now,
            closed_at: None,
        };

        let changes = ledger::replace_items(&mut order, &mut book, &input.items)?;
        StockLedger::persist(&mut *tx, &changes).await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, guest_id, guest_name, user_id, shift_id, order_items,
                                total_amount, status, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(order.guest_id)
        .bind(&order.guest_name)
        .bind(order.user_id)
        .bind(order.shift_id)
        .bind(Json(&order.order_items))
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(&order.comment)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            items = order.order_items.len(),
            total = %order.total_amount,
            "Order created"
        );
        row.try_into()
    }

    /// Get an order by ID
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?
        .try_into()
    }

    /// List orders, newest first
    pub async fn list_orders(&self, filter: OrderFilter) -> AppResult<PaginatedResponse<Order>> {
        let pagination = Pagination::from_query(filter.page, filter.per_page);
        let status = filter.status.map(|s| s.as_str());

        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR guest_id = $2)
              AND ($3::uuid IS NULL OR shift_id = $3)
              AND ($4::date IS NULL OR created_at::date >= $4)
              AND ($5::date IS NULL OR created_at::date <= $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM orders {}", WHERE))
            .bind(status)
            .bind(filter.guest_id)
            .bind(filter.shift_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            ORDER_COLUMNS, WHERE
        ))
        .bind(status)
        .bind(filter.guest_id)
        .bind(filter.shift_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Edit an active order: guest, comment and optionally all items
    pub async fn update_order(&self, order_id: Uuid, input: UpdateOrderInput) -> AppResult<Order> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let mut order = Self::lock_order(&mut *tx, order_id).await?;
        if !order.is_active() {
            return Err(ledger::LedgerError::InvalidState(order.status).into());
        }

        if input.guest_id.is_some() || input.guest_name.is_some() {
            let guest = GuestService::resolve_for_order(
                &mut *tx,
                input.guest_id,
                input.guest_name.as_deref().or(Some(order.guest_name.as_str())),
                &self.placeholder_names,
            )
            .await?;
            order.guest_id = guest.guest_id;
            order.guest_name = guest.guest_name;
        }
        if let Some(comment) = input.comment {
            order.comment = Some(comment);
        }

        if let Some(items) = input.items {
            if items.is_empty() {
                return Err(AppError::Validation {
                    field: "items".to_string(),
                    message: "An order needs at least one item; cancel it instead".to_string(),
                    message_ru: "В заказе должна быть хотя бы одна позиция; отмените заказ"
                        .to_string(),
                });
            }
            let changes = Self::replace_order_items(&mut *tx, &mut order, &items).await?;
            tracing::debug!(%order_id, products = changes.len(), "Order items replaced");
        }

        let saved = Self::save_order(&mut *tx, &order).await?;
        tx.commit().await?;
        Ok(saved)
    }

    /// Add an item to an active order
    pub async fn add_item(&self, order_id: Uuid, input: AddItemInput) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = Self::lock_order(&mut *tx, order_id).await?;

        let mut book = StockLedger::lock_book(&mut *tx, &[input.product_id]).await?;
        let changes =
            ledger::add_item_to_order(&mut order, &mut book, input.product_id, input.quantity)?;
        StockLedger::persist(&mut *tx, &changes).await?;

        let saved = Self::save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        tracing::info!(
            %order_id,
            product_id = %input.product_id,
            quantity = input.quantity,
            "Item added to order"
        );
        Ok(saved)
    }

    /// Remove the item at `index`, returning its stock. Removing the last
    /// item cancels the order.
    pub async fn remove_item(&self, order_id: Uuid, index: usize) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = Self::lock_order(&mut *tx, order_id).await?;

        let product_ids: Vec<Uuid> = order
            .order_items
            .get(index)
            .map(|item| vec![item.product_id])
            .unwrap_or_default();
        let mut book = StockLedger::lock_book(&mut *tx, &product_ids).await?;

        let (removed, changes) =
            ledger::remove_item_from_order(&mut order, &mut book, index, Utc::now())?;
        StockLedger::persist(&mut *tx, &changes).await?;

        let saved = Self::save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        tracing::info!(
            %order_id,
            product_id = %removed.product_id,
            quantity = removed.quantity,
            status = %saved.status,
            "Item removed from order"
        );
        Ok(saved)
    }

    /// Complete an active order and update the linked guest's statistics
    pub async fn complete_order(
        &self,
        order_id: Uuid,
        input: CompleteOrderInput,
    ) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = Self::lock_order(&mut *tx, order_id).await?;

        ledger::close_order(
            &mut order,
            OrderStatus::Completed,
            Some(input.payment_method),
            Utc::now(),
        )?;

        if let Some(guest_id) = order.guest_id {
            let stats = GuestService::record_visit(&mut *tx, guest_id, order.total_amount).await?;
            tracing::debug!(%guest_id, visits = stats.visit_count, "Guest statistics updated");
        }

        let saved = Self::save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        tracing::info!(
            %order_id,
            total = %saved.total_amount,
            payment_method = input.payment_method.as_str(),
            "Order completed"
        );
        Ok(saved)
    }

    /// Cancel an active order. Stock stays as it is.
    pub async fn cancel_order(&self, order_id: Uuid, input: CancelOrderInput) -> AppResult<Order> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let mut order = Self::lock_order(&mut *tx, order_id).await?;

        ledger::close_order(&mut order, OrderStatus::Cancelled, None, Utc::now())?;
        if let Some(reason) = input.reason.filter(|r| !r.trim().is_empty()) {
            order.comment = Some(reason);
        }

        let saved = Self::save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        tracing::info!(%order_id, "Order cancelled");
        Ok(saved)
    }

    async fn replace_order_items(
        conn: &mut PgConnection,
        order: &mut Order,
        items: &[NewOrderItem],
    ) -> AppResult<StockChanges> {
        let product_ids: Vec<Uuid> = order
            .order_items
            .iter()
            .map(|i| i.product_id)
            .chain(items.iter().map(|i| i.product_id))
            .collect();
        let mut book = StockLedger::lock_book(conn, &product_ids).await?;

        let changes = ledger::replace_items(order, &mut book, items)?;
        StockLedger::persist(conn, &changes).await?;
        Ok(changes)
    }

    async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?
        .try_into()
    }

    async fn save_order(conn: &mut PgConnection, order: &Order) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET guest_id = $1, guest_name = $2, order_items = $3, total_amount = $4,
                status = $5, payment_method = $6, comment = $7, closed_at = $8,
                updated_at = NOW()
            WHERE id = $9
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.guest_id)
        .bind(&order.guest_name)
        .bind(Json(&order.order_items))
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.payment_method.map(|m| m.as_str()))
        .bind(&order.comment)
        .bind(order.closed_at)
        .bind(order.id)
        .fetch_one(conn)
        .await?
        .try_into()
    }
}
