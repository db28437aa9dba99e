//! Guest HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::{Action, Order, PaginatedResponse, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::services::guest::{CreateGuestInput, Guest, GuestService, UpdateGuestInput};
use crate::services::order::{OrderFilter, OrderService};
use crate::AppState;

#[derive(Deserialize)]
pub struct GuestSearchQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List guests
pub async fn list_guests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<GuestSearchQuery>,
) -> AppResult<Json<Vec<Guest>>> {
    user.require(Resource::Guest, Action::View)?;
    let guests = GuestService::new(state.db.clone())
        .list_guests(query.search.as_deref())
        .await?;
    Ok(Json(guests))
}

/// Create a guest
pub async fn create_guest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateGuestInput>,
) -> AppResult<(StatusCode, Json<Guest>)> {
    user.require(Resource::Guest, Action::Create)?;
    let guest = GuestService::new(state.db.clone()).create_guest(input).await?;
    Ok((StatusCode::CREATED, Json(guest)))
}

/// Get a guest
pub async fn get_guest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guest_id): Path<Uuid>,
) -> AppResult<Json<Guest>> {
    user.require(Resource::Guest, Action::View)?;
    let guest = GuestService::new(state.db.clone()).get_guest(guest_id).await?;
    Ok(Json(guest))
}

/// Update a guest
pub async fn update_guest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guest_id): Path<Uuid>,
    Json(input): Json<UpdateGuestInput>,
) -> AppResult<Json<Guest>> {
    user.require(Resource::Guest, Action::Edit)?;
    let guest = GuestService::new(state.db.clone())
        .update_guest(guest_id, input)
        .await?;
    Ok(Json(guest))
}

/// Orders of a guest, newest first
pub async fn guest_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guest_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    user.require(Resource::Guest, Action::View)?;
    user.require(Resource::Order, Action::View)?;

    // 404 for unknown guests rather than an empty page
    GuestService::new(state.db.clone()).get_guest(guest_id).await?;

    let orders = OrderService::new(state.db.clone(), &state.config)
        .list_orders(OrderFilter {
            guest_id: Some(guest_id),
            page: query.page,
            per_page: query.per_page,
            ..Default::default()
        })
        .await?;
    Ok(Json(orders))
}
