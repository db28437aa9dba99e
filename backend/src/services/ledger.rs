//! Database side of the stock ledger
//!
//! Loads the products an operation touches into a [`StockBook`] and writes
//! the resulting stock changes back. Both run on the caller's transaction;
//! rows are locked with `FOR UPDATE` in ascending id order so that two
//! transactions touching overlapping products cannot deadlock.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use shared::ledger::{StockBook, StockChanges};
use shared::{IngredientRequirement, ProductStock};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    name: String,
    price: Decimal,
    is_composite: bool,
    stock: Decimal,
    unit_size: Decimal,
    unit: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct LinkRow {
    product_id: Uuid,
    ingredient_id: Uuid,
    quantity: Decimal,
}

/// Whether loaded product rows are locked until the transaction ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    ForUpdate,
    Shared,
}

/// Stock ledger persistence
pub struct StockLedger;

impl StockLedger {
    /// Load `product_ids` and all of their ingredients, locking every row.
    /// Fails with `NotFound` if any requested product does not exist.
    pub async fn lock_book(conn: &mut PgConnection, product_ids: &[Uuid]) -> AppResult<StockBook> {
        Self::load_book(conn, product_ids, LockMode::ForUpdate).await
    }

    /// Same as [`StockLedger::lock_book`] without row locks, for read-only
    /// availability reporting
    pub async fn read_book(conn: &mut PgConnection, product_ids: &[Uuid]) -> AppResult<StockBook> {
        Self::load_book(conn, product_ids, LockMode::Shared).await
    }

    async fn load_book(
        conn: &mut PgConnection,
        product_ids: &[Uuid],
        mode: LockMode,
    ) -> AppResult<StockBook> {
        let requested: BTreeSet<Uuid> = product_ids.iter().copied().collect();
        if requested.is_empty() {
            return Ok(StockBook::default());
        }
        let requested_ids: Vec<Uuid> = requested.iter().copied().collect();

        let links = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT product_id, ingredient_id, quantity
            FROM product_ingredients
            WHERE product_id = ANY($1)
            ORDER BY product_id, ingredient_id
            "#,
        )
        .bind(&requested_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut all_ids = requested.clone();
        all_ids.extend(links.iter().map(|l| l.ingredient_id));
        let all_ids: Vec<Uuid> = all_ids.into_iter().collect();

        let sql = match mode {
            LockMode::ForUpdate => {
                r#"
                SELECT id, name, price, is_composite, stock, unit_size, unit, is_active
                FROM products
                WHERE id = ANY($1)
                ORDER BY id
                FOR UPDATE
                "#
            }
            LockMode::Shared => {
                r#"
                SELECT id, name, price, is_composite, stock, unit_size, unit, is_active
                FROM products
                WHERE id = ANY($1)
                ORDER BY id
                "#
            }
        };

        let rows = sqlx::query_as::<_, StockRow>(sql)
            .bind(&all_ids)
            .fetch_all(&mut *conn)
            .await?;

        if let Some(missing) = requested
            .iter()
            .find(|id| !rows.iter().any(|row| row.id == **id))
        {
            return Err(AppError::NotFound(format!("Product {}", missing)));
        }

        let mut recipes: BTreeMap<Uuid, Vec<IngredientRequirement>> = BTreeMap::new();
        for link in links {
            recipes
                .entry(link.product_id)
                .or_default()
                .push(IngredientRequirement {
                    ingredient_id: link.ingredient_id,
                    quantity: link.quantity,
                });
        }

        let book = StockBook::new(rows.into_iter().map(|row| ProductStock {
            ingredients: recipes.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            price: row.price,
            is_composite: row.is_composite,
            stock: row.stock,
            unit_size: row.unit_size,
            unit: row.unit,
            is_active: row.is_active,
        }));

        Ok(book)
    }

    /// Write stock changes computed by the ledger. Rows must already be
    /// locked by [`StockLedger::lock_book`] on the same transaction.
    pub async fn persist(conn: &mut PgConnection, changes: &StockChanges) -> AppResult<()> {
        for (product_id, change) in changes {
            sqlx::query("UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
                .bind(change)
                .bind(product_id)
                .execute(&mut *conn)
                .await?;
        }

        if !changes.is_empty() {
            tracing::debug!(products = changes.len(), ?changes, "Stock changes applied");
        }
        Ok(())
    }
}
