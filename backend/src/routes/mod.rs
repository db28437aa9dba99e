//! Route definitions for the bar POS API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{analytics, auth, category, guest, order, product, shift, user, write_off};
use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login and refresh are public)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes
        .nest("/users", user_routes(state.clone()))
        .nest("/categories", category_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/guests", guest_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()))
        .nest("/shifts", shift_routes(state.clone()))
        .nest("/write-offs", write_off_routes(state.clone()))
        .nest("/analytics", analytics_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .merge(protected)
}

/// Staff account routes (protected)
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(user::list_users).post(user::create_user))
        .route("/:user_id", put(user::update_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Category routes (protected)
fn category_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(category::list_categories).post(category::create_category),
        )
        .route(
            "/:category_id",
            put(category::update_category).delete(category::delete_category),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product catalog routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(product::list_products).post(product::create_product),
        )
        .route("/low-stock", get(product::low_stock))
        .route(
            "/:product_id",
            get(product::get_product)
                .put(product::update_product)
                .delete(product::deactivate_product),
        )
        .route("/:product_id/ingredients", put(product::set_ingredients))
        .route("/:product_id/stock", post(product::adjust_stock))
        .route("/:product_id/availability", get(product::get_availability))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Guest routes (protected)
fn guest_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(guest::list_guests).post(guest::create_guest))
        .route(
            "/:guest_id",
            get(guest::get_guest).put(guest::update_guest),
        )
        .route("/:guest_id/orders", get(guest::guest_orders))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(order::list_orders).post(order::create_order))
        .route(
            "/:order_id",
            get(order::get_order).put(order::update_order),
        )
        .route("/:order_id/items", post(order::add_item))
        .route("/:order_id/items/:index", delete(order::remove_item))
        .route("/:order_id/complete", post(order::complete_order))
        .route("/:order_id/cancel", post(order::cancel_order))
        .route(
            "/:order_id/write-offs",
            get(write_off::list_order_write_offs).post(write_off::create_write_off),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Shift routes (protected)
fn shift_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(shift::list_shifts).post(shift::open_shift))
        .route("/current", get(shift::current_shift))
        .route("/:shift_id/close", post(shift::close_shift))
        .route("/:shift_id/summary", get(shift::shift_summary))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Write-off routes (protected)
fn write_off_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(write_off::list_write_offs))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Analytics routes (protected)
fn analytics_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(analytics::sales_summary))
        .route("/top-products", get(analytics::top_products))
        .route("/payment-methods", get(analytics::payment_methods))
        .route("/export", get(analytics::export_orders))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
