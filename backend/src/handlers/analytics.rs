//! Analytics handlers for sales reports and data export

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{Action, DateRange, Resource};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::analytics::{
    AnalyticsService, PaymentMethodStats, SalesSummary, TopProductsBy,
};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Deserialize)]
pub struct TopProductsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub by: TopProductsBy,
    pub limit: Option<i64>,
    pub format: Option<String>,
}

fn resolve_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> AppResult<DateRange> {
    DateRange::resolve(from, to, Utc::now().date_naive())
        .ok_or_else(|| AppError::invalid_field("from", "Start date is after end date"))
}

fn csv_response(filename: &str, csv: String) -> axum::response::Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response()
}

/// Sales summary for a date range
pub async fn sales_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<SalesSummary>> {
    user.require(Resource::Report, Action::View)?;
    let range = resolve_range(query.from, query.to)?;
    let summary = AnalyticsService::new(state.db.clone())
        .sales_summary(range)
        .await?;
    Ok(Json(summary))
}

/// Best selling products
pub async fn top_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TopProductsQuery>,
) -> AppResult<impl IntoResponse> {
    user.require(Resource::Report, Action::View)?;
    let range = resolve_range(query.from, query.to)?;
    let data = AnalyticsService::new(state.db.clone())
        .top_products(range, query.by, query.limit.unwrap_or(10))
        .await?;

    if query.format.as_deref() == Some("csv") {
        let csv = AnalyticsService::export_to_csv(&data)?;
        Ok(csv_response("top_products.csv", csv))
    } else {
        Ok(Json(data).into_response())
    }
}

/// Revenue by payment method
pub async fn payment_methods(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<PaymentMethodStats>>> {
    user.require(Resource::Report, Action::View)?;
    let range = resolve_range(query.from, query.to)?;
    let stats = AnalyticsService::new(state.db.clone())
        .payment_methods(range)
        .await?;
    Ok(Json(stats))
}

/// Completed orders of a date range as CSV (or JSON with `format=json`)
pub async fn export_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    user.require(Resource::Report, Action::View)?;
    let range = resolve_range(query.from, query.to)?;
    let rows = AnalyticsService::new(state.db.clone())
        .completed_orders(range)
        .await?;

    if query.format.as_deref() == Some("json") {
        return Ok(Json(rows).into_response());
    }

    let csv = AnalyticsService::export_to_csv(&rows)?;
    let filename = format!("orders_{}_{}.csv", range.start, range.end);
    tracing::info!(user_id = %user.user_id, orders = rows.len(), "Orders exported");
    Ok(csv_response(&filename, csv))
}
