//! Category HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::services::category::{Category, CategoryInput, CategoryService};
use crate::AppState;

/// List categories
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Category>>> {
    user.require(Resource::Product, Action::View)?;
    let categories = CategoryService::new(state.db.clone()).list_categories().await?;
    Ok(Json(categories))
}

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    user.require(Resource::Product, Action::Create)?;
    let category = CategoryService::new(state.db.clone())
        .create_category(input)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Update a category
pub async fn update_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(category_id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    user.require(Resource::Product, Action::Edit)?;
    let category = CategoryService::new(state.db.clone())
        .update_category(category_id, input)
        .await?;
    Ok(Json(category))
}

/// Delete a category
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(category_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require(Resource::Product, Action::Delete)?;
    CategoryService::new(state.db.clone())
        .delete_category(category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
