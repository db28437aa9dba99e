//! Product catalog service: products, recipes and stock adjustments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ledger::StockChanges;
use shared::{
    is_low_stock, validate_ingredients, validate_price, validate_threshold, validate_unit_size,
    IngredientRequirement,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::StockLedger;

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub stock: Decimal,
    pub unit_size: Decimal,
    pub unit: String,
    pub is_composite: bool,
    pub low_stock_threshold: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ingredient line of a composite product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductIngredient {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub ingredient_stock: Decimal,
}

/// Product with its recipe and sellable quantity
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub ingredients: Vec<ProductIngredient>,
    pub available_quantity: i64,
}

/// Units of a product that can be sold right now
#[derive(Debug, Clone, Serialize)]
pub struct ProductAvailability {
    pub product_id: Uuid,
    pub name: String,
    pub is_composite: bool,
    pub available_quantity: i64,
}

/// Entry of the low-stock report
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    pub product_id: Uuid,
    pub name: String,
    pub is_composite: bool,
    /// Stock on hand for simple products, available portions for composites
    pub level: Decimal,
    pub unit: String,
    pub low_stock_threshold: Decimal,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub category_id: Option<Uuid>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub stock: Option<Decimal>,
    pub unit_size: Option<Decimal>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_composite: bool,
    pub low_stock_threshold: Option<Decimal>,
}

/// Input for updating a product. Stock is changed through adjustments only.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub unit_size: Option<Decimal>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub is_composite: Option<bool>,
    pub low_stock_threshold: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Restock or correction of a simple product's stock
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    /// Signed change in stock units (positive = restock)
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Replacement recipe for a composite product
#[derive(Debug, Deserialize)]
pub struct SetIngredientsInput {
    pub ingredients: Vec<IngredientRequirement>,
}

/// Filters for listing products
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub is_composite: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

const PRODUCT_COLUMNS: &str = "id, category_id, name, price, cost_price, stock, unit_size, \
                               unit, is_composite, low_stock_threshold, is_active, \
                               created_at, updated_at";

fn check(field: &str, result: Result<(), &'static str>) -> AppResult<()> {
    result.map_err(|msg| AppError::invalid_field(field, msg))
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        let cost_price = input.cost_price.unwrap_or(Decimal::ZERO);
        let unit_size = input.unit_size.unwrap_or(Decimal::ONE);
        let threshold = input.low_stock_threshold.unwrap_or(Decimal::ZERO);
        check("price", validate_price(input.price))?;
        check("cost_price", validate_price(cost_price))?;
        check("unit_size", validate_unit_size(unit_size))?;
        check("low_stock_threshold", validate_threshold(threshold))?;

        // Composite stock is derived from ingredients
        let stock = if input.is_composite {
            Decimal::ZERO
        } else {
            input.stock.unwrap_or(Decimal::ZERO)
        };

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (category_id, name, price, cost_price, stock, unit_size, unit,
                                  is_composite, low_stock_threshold)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(input.price)
        .bind(cost_price)
        .bind(stock)
        .bind(unit_size)
        .bind(input.unit.as_deref().unwrap_or("pcs"))
        .bind(input.is_composite)
        .bind(threshold)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    async fn fetch_product(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Get a product with its ingredients and available quantity
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductDetail> {
        let product = self.fetch_product(product_id).await?;

        let ingredients = sqlx::query_as::<_, ProductIngredient>(
            r#"
            SELECT pi.ingredient_id, p.name AS ingredient_name, pi.quantity, p.unit,
                   p.stock AS ingredient_stock
            FROM product_ingredients pi
            JOIN products p ON p.id = pi.ingredient_id
            WHERE pi.product_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        let available_quantity = self.availability(product_id).await?.available_quantity;

        Ok(ProductDetail {
            product,
            ingredients,
            available_quantity,
        })
    }

    /// List products
    pub async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1::uuid IS NULL OR category_id = $1)
              AND ($2::bool IS NULL OR is_composite = $2)
              AND ($3::bool IS NULL OR is_active = $3)
              AND ($4::text IS NULL OR LOWER(name) LIKE $4)
            ORDER BY name
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(filter.category_id)
        .bind(filter.is_composite)
        .bind(filter.is_active)
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Update catalog fields of a product
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        let existing = self.fetch_product(product_id).await?;

        let price = input.price.unwrap_or(existing.price);
        let cost_price = input.cost_price.unwrap_or(existing.cost_price);
        let unit_size = input.unit_size.unwrap_or(existing.unit_size);
        let threshold = input
            .low_stock_threshold
            .unwrap_or(existing.low_stock_threshold);
        check("price", validate_price(price))?;
        check("cost_price", validate_price(cost_price))?;
        check("unit_size", validate_unit_size(unit_size))?;
        check("low_stock_threshold", validate_threshold(threshold))?;

        let is_composite = input.is_composite.unwrap_or(existing.is_composite);

        let mut tx = self.db.begin().await?;

        if is_composite && !existing.is_composite {
            let used_as_ingredient = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM product_ingredients WHERE ingredient_id = $1)",
            )
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
            if used_as_ingredient {
                return Err(AppError::Conflict {
                    resource: "is_composite".to_string(),
                    message: "Product is an ingredient of another product".to_string(),
                    message_ru: "Товар используется как ингредиент другого товара".to_string(),
                });
            }
        }
        if !is_composite && existing.is_composite {
            sqlx::query("DELETE FROM product_ingredients WHERE product_id = $1")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = $1, category_id = $2, price = $3, cost_price = $4, unit_size = $5,
                unit = $6, is_composite = $7, low_stock_threshold = $8, is_active = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(input.category_id.or(existing.category_id))
        .bind(price)
        .bind(cost_price)
        .bind(unit_size)
        .bind(input.unit.as_deref().unwrap_or(&existing.unit))
        .bind(is_composite)
        .bind(threshold)
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Hide a product from the catalog. Orders keep their snapshots.
    pub async fn deactivate_product(&self, product_id: Uuid) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(product_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        tracing::info!(%product_id, "Product deactivated");
        Ok(())
    }

    /// Restock or correct the stock of a simple product
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<Product> {
        input.validate()?;
        if input.quantity.is_zero() {
            return Err(AppError::invalid_field("quantity", "Adjustment cannot be zero"));
        }

        let mut tx = self.db.begin().await?;

        let is_composite = sqlx::query_scalar::<_, bool>(
            "SELECT is_composite FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        if is_composite {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Composite products have no own stock; adjust their ingredients"
                    .to_string(),
                message_ru: "У составного товара нет своего остатка; измените ингредиенты"
                    .to_string(),
            });
        }

        let changes = StockChanges::from([(product_id, input.quantity)]);
        StockLedger::persist(&mut *tx, &changes).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %product_id,
            %user_id,
            quantity = %input.quantity,
            stock = %product.stock,
            reason = input.reason.as_deref().unwrap_or(""),
            "Stock adjusted"
        );
        Ok(product)
    }

    /// Replace the recipe of a composite product
    pub async fn set_ingredients(
        &self,
        product_id: Uuid,
        input: SetIngredientsInput,
    ) -> AppResult<ProductDetail> {
        check(
            "ingredients",
            validate_ingredients(product_id, &input.ingredients),
        )?;

        let mut tx = self.db.begin().await?;

        let is_composite = sqlx::query_scalar::<_, bool>(
            "SELECT is_composite FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        if !is_composite {
            return Err(AppError::invalid_field(
                "ingredients",
                "Only composite products have ingredients",
            ));
        }

        let ingredient_ids: Vec<Uuid> = input.ingredients.iter().map(|i| i.ingredient_id).collect();
        let found = sqlx::query_as::<_, (Uuid, bool)>(
            "SELECT id, is_composite FROM products WHERE id = ANY($1)",
        )
        .bind(&ingredient_ids)
        .fetch_all(&mut *tx)
        .await?;

        for id in &ingredient_ids {
            match found.iter().find(|(found_id, _)| found_id == id) {
                None => return Err(AppError::NotFound(format!("Ingredient {}", id))),
                Some((_, true)) => {
                    return Err(AppError::invalid_field(
                        "ingredients",
                        "An ingredient must be a simple product",
                    ))
                }
                Some(_) => {}
            }
        }

        sqlx::query("DELETE FROM product_ingredients WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for link in &input.ingredients {
            sqlx::query(
                "INSERT INTO product_ingredients (product_id, ingredient_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(product_id)
            .bind(link.ingredient_id)
            .bind(link.quantity)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE products SET updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%product_id, ingredients = input.ingredients.len(), "Recipe updated");
        self.get_product(product_id).await
    }

    /// Units of a product that can be sold right now
    pub async fn availability(&self, product_id: Uuid) -> AppResult<ProductAvailability> {
        let mut conn = self.db.acquire().await?;
        let book = StockLedger::read_book(&mut *conn, &[product_id]).await?;

        let product = book.product(product_id)?;
        Ok(ProductAvailability {
            product_id,
            name: product.name.clone(),
            is_composite: product.is_composite,
            available_quantity: book.available_quantity(product_id)?,
        })
    }

    /// Active products at or below their alert threshold
    pub async fn low_stock(&self) -> AppResult<Vec<LowStockItem>> {
        let products = self
            .list_products(ProductFilter {
                is_active: Some(true),
                ..Default::default()
            })
            .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut conn = self.db.acquire().await?;
        let book = StockLedger::read_book(&mut *conn, &ids).await?;

        let mut report = Vec::new();
        for product in products {
            let level = if product.is_composite {
                Decimal::from(book.available_quantity(product.id)?)
            } else {
                product.stock
            };
            if is_low_stock(level, product.low_stock_threshold) {
                report.push(LowStockItem {
                    product_id: product.id,
                    name: product.name,
                    is_composite: product.is_composite,
                    level,
                    unit: product.unit,
                    low_stock_threshold: product.low_stock_threshold,
                });
            }
        }

        Ok(report)
    }
}
