//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Action, Order, PaginatedResponse, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::services::order::{
    AddItemInput, CancelOrderInput, CompleteOrderInput, CreateOrderInput, OrderFilter,
    OrderService, UpdateOrderInput,
};
use crate::AppState;

fn service(state: &AppState) -> OrderService {
    OrderService::new(state.db.clone(), &state.config)
}

/// List orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    user.require(Resource::Order, Action::View)?;
    let orders = service(&state).list_orders(filter).await?;
    Ok(Json(orders))
}

/// Open a new order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    user.require(Resource::Order, Action::Create)?;
    let order = service(&state).create_order(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get an order
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::View)?;
    let order = service(&state).get_order(order_id).await?;
    Ok(Json(order))
}

/// Edit an active order
pub async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::Edit)?;
    let order = service(&state).update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Add an item to an order
pub async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AddItemInput>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::Edit)?;
    let order = service(&state).add_item(order_id, input).await?;
    Ok(Json(order))
}

/// Remove the item at a position
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((order_id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::Edit)?;
    let order = service(&state).remove_item(order_id, index).await?;
    Ok(Json(order))
}

/// Complete an order
pub async fn complete_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CompleteOrderInput>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::Edit)?;
    let order = service(&state).complete_order(order_id, input).await?;
    Ok(Json(order))
}

/// Cancel an order
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<Order>> {
    user.require(Resource::Order, Action::Edit)?;
    let order = service(&state).cancel_order(order_id, input).await?;
    Ok(Json(order))
}
