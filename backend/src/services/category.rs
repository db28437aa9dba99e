//! Product category service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Category service
#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

/// Category record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub sort_order: i32,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or renaming a category
#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    pub sort_order: Option<i32>,
}

impl CategoryService {
    /// Create a new CategoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a category
    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, sort_order)
            VALUES ($1, $2)
            RETURNING id, name, sort_order, 0::bigint AS product_count, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.sort_order.unwrap_or(0))
        .fetch_one(&self.db)
        .await
        .map_err(unique_name)?;

        Ok(category)
    }

    /// List categories in display order with their product counts
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.sort_order, COUNT(p.id) AS product_count, c.created_at
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id AND p.is_active = true
            GROUP BY c.id
            ORDER BY c.sort_order, c.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    /// Rename or reorder a category
    pub async fn update_category(&self, category_id: Uuid, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;

        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories c
            SET name = $1, sort_order = COALESCE($2, c.sort_order)
            WHERE c.id = $3
            RETURNING c.id, c.name, c.sort_order,
                      (SELECT COUNT(*) FROM products p
                       WHERE p.category_id = c.id AND p.is_active = true) AS product_count,
                      c.created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.sort_order)
        .bind(category_id)
        .fetch_optional(&self.db)
        .await
        .map_err(unique_name)?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))
    }

    /// Delete a category. Its products stay in the catalog without one.
    pub async fn delete_category(&self, category_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }
        Ok(())
    }
}

fn unique_name(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry("name".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
