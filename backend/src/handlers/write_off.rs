//! Write-off HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use shared::{Action, DateRange, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::write_off::{CreateWriteOffInput, WriteOff, WriteOffQuery, WriteOffService};
use crate::AppState;

/// Record a write-off against an order
pub async fn create_write_off(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CreateWriteOffInput>,
) -> AppResult<(StatusCode, Json<WriteOff>)> {
    user.require(Resource::WriteOff, Action::Create)?;
    let write_off = WriteOffService::new(state.db.clone())
        .create_write_off(order_id, user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(write_off)))
}

/// Write-offs of an order
pub async fn list_order_write_offs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<WriteOff>>> {
    user.require(Resource::WriteOff, Action::View)?;
    let write_offs = WriteOffService::new(state.db.clone())
        .list_by_order(order_id)
        .await?;
    Ok(Json(write_offs))
}

/// Write-offs within a date range
pub async fn list_write_offs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<WriteOffQuery>,
) -> AppResult<Json<Vec<WriteOff>>> {
    user.require(Resource::WriteOff, Action::View)?;
    let range = DateRange::resolve(query.from, query.to, Utc::now().date_naive())
        .ok_or_else(|| AppError::invalid_field("from", "Start date is after end date"))?;
    let write_offs = WriteOffService::new(state.db.clone())
        .list_by_range(range)
        .await?;
    Ok(Json(write_offs))
}
