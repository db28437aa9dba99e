//! Product catalog HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::services::product::{
    AdjustStockInput, CreateProductInput, LowStockItem, Product, ProductAvailability,
    ProductDetail, ProductFilter, ProductService, SetIngredientsInput, UpdateProductInput,
};
use crate::AppState;

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    user.require(Resource::Product, Action::View)?;
    let products = ProductService::new(state.db.clone()).list_products(filter).await?;
    Ok(Json(products))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    user.require(Resource::Product, Action::Create)?;
    let product = ProductService::new(state.db.clone()).create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product with its recipe and availability
pub async fn get_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductDetail>> {
    user.require(Resource::Product, Action::View)?;
    let product = ProductService::new(state.db.clone()).get_product(product_id).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    user.require(Resource::Product, Action::Edit)?;
    let product = ProductService::new(state.db.clone())
        .update_product(product_id, input)
        .await?;
    Ok(Json(product))
}

/// Deactivate a product
pub async fn deactivate_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require(Resource::Product, Action::Delete)?;
    ProductService::new(state.db.clone())
        .deactivate_product(product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a composite product's recipe
pub async fn set_ingredients(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<SetIngredientsInput>,
) -> AppResult<Json<ProductDetail>> {
    user.require(Resource::Product, Action::Edit)?;
    let product = ProductService::new(state.db.clone())
        .set_ingredients(product_id, input)
        .await?;
    Ok(Json(product))
}

/// Restock or correct a product's stock
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<Product>> {
    user.require(Resource::Product, Action::Edit)?;
    let product = ProductService::new(state.db.clone())
        .adjust_stock(product_id, user.user_id, input)
        .await?;
    Ok(Json(product))
}

/// Units of a product that can be sold now
pub async fn get_availability(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductAvailability>> {
    user.require(Resource::Product, Action::View)?;
    let availability = ProductService::new(state.db.clone())
        .availability(product_id)
        .await?;
    Ok(Json(availability))
}

/// Products at or below their alert threshold
pub async fn low_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<LowStockItem>>> {
    user.require(Resource::Product, Action::View)?;
    let report = ProductService::new(state.db.clone()).low_stock().await?;
    Ok(Json(report))
}
