//! Shift HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::shift::{CloseShiftInput, OpenShiftInput, Shift, ShiftService, ShiftSummary};
use crate::AppState;

#[derive(Deserialize)]
pub struct ShiftListQuery {
    pub limit: Option<i64>,
}

/// List recent shifts
pub async fn list_shifts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ShiftListQuery>,
) -> AppResult<Json<Vec<Shift>>> {
    user.require(Resource::Shift, Action::View)?;
    let shifts = ShiftService::new(state.db.clone())
        .list_shifts(query.limit.unwrap_or(30))
        .await?;
    Ok(Json(shifts))
}

/// Open a shift
pub async fn open_shift(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<OpenShiftInput>,
) -> AppResult<(StatusCode, Json<Shift>)> {
    user.require(Resource::Shift, Action::Create)?;
    let shift = ShiftService::new(state.db.clone())
        .open_shift(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

/// The open shift
pub async fn current_shift(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Shift>> {
    user.require(Resource::Shift, Action::View)?;
    let shift = ShiftService::new(state.db.clone())
        .current_shift()
        .await?
        .ok_or_else(|| AppError::NotFound("Open shift".to_string()))?;
    Ok(Json(shift))
}

/// Close a shift
pub async fn close_shift(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(shift_id): Path<Uuid>,
    Json(input): Json<CloseShiftInput>,
) -> AppResult<Json<Shift>> {
    user.require(Resource::Shift, Action::Edit)?;
    let shift = ShiftService::new(state.db.clone())
        .close_shift(shift_id, input)
        .await?;
    Ok(Json(shift))
}

/// Shift report
pub async fn shift_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(shift_id): Path<Uuid>,
) -> AppResult<Json<ShiftSummary>> {
    user.require(Resource::Shift, Action::View)?;
    let summary = ShiftService::new(state.db.clone())
        .shift_summary(shift_id)
        .await?;
    Ok(Json(summary))
}
